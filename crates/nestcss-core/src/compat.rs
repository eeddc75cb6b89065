//! Browser targets and vendor prefix patching.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::ast::Declaration;
use crate::value::{Value, ValueList};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserType {
    Chrome,
    Edge,
    Firefox,
    #[serde(rename = "ie")]
    InternetExplorer,
    Opera,
    Safari,
}

impl BrowserType {
    pub fn prefix(self) -> Prefix {
        match self {
            BrowserType::Chrome | BrowserType::Safari | BrowserType::Opera => Prefix::Webkit,
            BrowserType::Firefox => Prefix::Moz,
            BrowserType::InternetExplorer | BrowserType::Edge => Prefix::Ms,
        }
    }
}

impl FromStr for BrowserType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chrome" => Ok(BrowserType::Chrome),
            "edge" => Ok(BrowserType::Edge),
            "firefox" => Ok(BrowserType::Firefox),
            "ie" => Ok(BrowserType::InternetExplorer),
            "opera" => Ok(BrowserType::Opera),
            "safari" => Ok(BrowserType::Safari),
            other => Err(format!("unknown browser '{other}'")),
        }
    }
}

/// A vendor prefix. Each maps to one bit of a [`PrefixSet`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Prefix {
    Moz,
    Ms,
    Webkit,
}

impl Prefix {
    pub fn text(self) -> &'static str {
        match self {
            Prefix::Moz => "-moz-",
            Prefix::Ms => "-ms-",
            Prefix::Webkit => "-webkit-",
        }
    }

    fn bit(self) -> u8 {
        match self {
            Prefix::Moz => 1,
            Prefix::Ms => 1 << 1,
            Prefix::Webkit => 1 << 2,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PrefixSet(u8);

impl PrefixSet {
    pub fn contains(self, prefix: Prefix) -> bool {
        self.0 & prefix.bit() != 0
    }

    pub fn insert(&mut self, prefix: Prefix) {
        self.0 |= prefix.bit();
    }
}

/// A browser target, e.g. Chrome 30.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct Browser {
    #[serde(rename = "browser")]
    pub kind: BrowserType,
    pub version: f32,
}

impl Browser {
    pub fn new(kind: BrowserType, version: f32) -> Self {
        Self { kind, version }
    }

    pub fn chrome(version: f32) -> Self {
        Self::new(BrowserType::Chrome, version)
    }

    pub fn firefox(version: f32) -> Self {
        Self::new(BrowserType::Firefox, version)
    }

    pub fn safari(version: f32) -> Self {
        Self::new(BrowserType::Safari, version)
    }

    pub fn prefix(&self) -> Prefix {
        self.kind.prefix()
    }
}

/// Parses the `name:version` form, e.g. `safari:8`.
impl FromStr for Browser {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, version) = s
            .split_once(':')
            .ok_or_else(|| format!("expected <browser>:<version>, got '{s}'"))?;
        let kind = name.trim().parse()?;
        let version = version
            .trim()
            .parse()
            .map_err(|_| format!("invalid version '{version}'"))?;
        Ok(Self { kind, version })
    }
}

impl fmt::Display for Browser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {}", self.kind, self.version)
    }
}

/// How a prefixed copy of a declaration is built.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Patcher {
    /// Prefix the property name only.
    PrefixName,
    /// Prefix the name and any `transform` keyword in the value.
    PrefixNameAndValue,
}

/// Versions before which a property still needs its vendor prefix, per
/// browser. Zero means the browser never needs one.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Support {
    pub chrome: f32,
    pub edge: f32,
    pub firefox: f32,
    pub ie: f32,
    pub opera: f32,
    pub safari: f32,
}

impl Support {
    fn threshold(&self, kind: BrowserType) -> f32 {
        match kind {
            BrowserType::Chrome => self.chrome,
            BrowserType::Edge => self.edge,
            BrowserType::Firefox => self.firefox,
            BrowserType::InternetExplorer => self.ie,
            BrowserType::Opera => self.opera,
            BrowserType::Safari => self.safari,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PropertyInfo {
    pub support: Support,
    pub patcher: Patcher,
}

/// A prefixed copy of a declaration.
#[derive(Clone, Debug, PartialEq)]
pub struct Patch {
    pub name: String,
    pub value: Value,
}

impl PropertyInfo {
    pub fn new(support: Support, patcher: Patcher) -> Self {
        Self { support, patcher }
    }

    pub fn has_patches(&self) -> bool {
        self.support != Support::default()
    }

    pub fn has_patch(&self, browser: &Browser) -> bool {
        browser.version < self.support.threshold(browser.kind)
    }

    /// Whether any of `browsers` needs a prefixed copy.
    pub fn needs_expansion(&self, browsers: &[Browser]) -> bool {
        self.has_patches() && browsers.iter().any(|browser| self.has_patch(browser))
    }

    pub fn patch(&self, declaration: &Declaration, browser: &Browser) -> Patch {
        let prefix = browser.prefix();
        let value = match self.patcher {
            Patcher::PrefixName => declaration.value.clone(),
            Patcher::PrefixNameAndValue => patch_value(&declaration.value, prefix),
        };
        Patch {
            name: format!("{}{}", prefix.text(), declaration.name),
            value,
        }
    }
}

/// Rewrites `transform` keywords to their prefixed form, descending into
/// nested lists such as the comma groups of a `transition`.
pub fn patch_value(value: &Value, prefix: Prefix) -> Value {
    match value {
        Value::String(text) if text == "transform" => {
            Value::String(format!("{}transform", prefix.text()))
        }
        Value::List(list) => Value::List(ValueList {
            items: list.items.iter().map(|item| patch_value(item, prefix)).collect(),
            separator: list.separator,
        }),
        other => other.clone(),
    }
}

/// The prefixed copies to emit ahead of `declaration`, in target order.
/// Browsers sharing a prefix produce one copy.
pub fn patches(declaration: &Declaration, info: &PropertyInfo, browsers: &[Browser]) -> Vec<Patch> {
    let mut emitted = PrefixSet::default();
    let mut out = Vec::new();
    if !info.has_patches() {
        return out;
    }
    for browser in browsers {
        let prefix = browser.prefix();
        if emitted.contains(prefix) || !info.has_patch(browser) {
            continue;
        }
        out.push(info.patch(declaration, browser));
        emitted.insert(prefix);
    }
    out
}

/// Property metadata keyed by property name.
#[derive(Clone, Debug, Default)]
pub struct PropertyTable {
    properties: HashMap<String, PropertyInfo>,
}

impl PropertyTable {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Prefix data for the commonly prefixed properties.
    pub fn standard() -> Self {
        let mut table = Self::empty();
        let entries = [
            ("transform", Patcher::PrefixName, support(36.0, 0.0, 16.0, 10.0, 23.0, 9.0)),
            ("transform-origin", Patcher::PrefixName, support(36.0, 0.0, 16.0, 10.0, 23.0, 9.0)),
            ("transition", Patcher::PrefixNameAndValue, support(26.0, 0.0, 16.0, 0.0, 12.1, 7.0)),
            ("animation", Patcher::PrefixName, support(43.0, 0.0, 16.0, 0.0, 30.0, 9.0)),
            ("user-select", Patcher::PrefixName, support(54.0, 79.0, 69.0, 12.0, 41.0, 99.0)),
            ("appearance", Patcher::PrefixName, support(84.0, 84.0, 80.0, 0.0, 70.0, 15.4)),
            ("box-sizing", Patcher::PrefixName, support(10.0, 0.0, 29.0, 0.0, 0.0, 5.1)),
            ("backface-visibility", Patcher::PrefixName, support(36.0, 0.0, 16.0, 0.0, 23.0, 99.0)),
            ("column-count", Patcher::PrefixName, support(50.0, 0.0, 52.0, 0.0, 37.0, 9.0)),
            ("filter", Patcher::PrefixName, support(53.0, 0.0, 0.0, 0.0, 40.0, 9.1)),
        ];
        for (name, patcher, support) in entries {
            table.insert(name, PropertyInfo::new(support, patcher));
        }
        table
    }

    pub fn insert(&mut self, name: impl Into<String>, info: PropertyInfo) {
        self.properties.insert(name.into(), info);
    }

    pub fn get(&self, name: &str) -> Option<&PropertyInfo> {
        self.properties.get(name)
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

const fn support(chrome: f32, edge: f32, firefox: f32, ie: f32, opera: f32, safari: f32) -> Support {
    Support {
        chrome,
        edge,
        firefox,
        ie,
        opera,
        safari,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Span;
    use crate::parser::parse_value;

    fn decl(name: &str, value: &str) -> Declaration {
        Declaration {
            name: name.into(),
            value: parse_value(value).unwrap(),
            span: Span::dummy(),
        }
    }

    #[test]
    fn parse_browser_targets() {
        assert_eq!("chrome:30".parse::<Browser>().unwrap(), Browser::chrome(30.0));
        assert_eq!("Safari: 8.1".parse::<Browser>().unwrap(), Browser::safari(8.1));
        assert!("netscape:4".parse::<Browser>().is_err());
        assert!("chrome".parse::<Browser>().is_err());
    }

    #[test]
    fn shared_prefixes_emit_once() {
        let table = PropertyTable::standard();
        let info = table.get("transform").unwrap();
        let browsers = [Browser::chrome(30.0), Browser::safari(6.0), Browser::firefox(15.0)];
        let out = patches(&decl("transform", "rotate(45deg)"), info, &browsers);
        let names: Vec<&str> = out.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["-webkit-transform", "-moz-transform"]);
    }

    #[test]
    fn modern_browsers_need_nothing() {
        let table = PropertyTable::standard();
        let info = table.get("transform").unwrap();
        let browsers = [Browser::chrome(100.0), Browser::firefox(100.0)];
        assert!(!info.needs_expansion(&browsers));
        assert!(patches(&decl("transform", "none"), info, &browsers).is_empty());
    }

    #[test]
    fn transition_values_are_patched() {
        let table = PropertyTable::standard();
        let info = table.get("transition").unwrap();
        let out = patches(
            &decl("transition", "transform 0.04s linear, opacity 0.04s linear"),
            info,
            &[Browser::chrome(20.0)],
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "-webkit-transition");
        assert_eq!(
            out[0].value.to_string(),
            "-webkit-transform 0.04s linear, opacity 0.04s linear"
        );
    }

    #[test]
    fn prefix_set_tracks_bits() {
        let mut set = PrefixSet::default();
        assert!(!set.contains(Prefix::Moz));
        set.insert(Prefix::Moz);
        assert!(set.contains(Prefix::Moz));
        assert!(!set.contains(Prefix::Webkit));
    }
}
