use std::collections::HashMap;
use std::fmt;

use csscolorparser::Color;

use crate::value::{UnitValue, Value};

/// A function callable from values, given its evaluated arguments.
pub type BuiltinFn = Box<dyn Fn(&[Value]) -> Value + Send + Sync>;

/// Named functions available to a compilation.
pub struct FunctionTable {
    functions: HashMap<String, BuiltinFn>,
}

impl FunctionTable {
    /// A table with nothing registered.
    pub fn empty() -> Self {
        Self {
            functions: HashMap::new(),
        }
    }

    pub fn with_builtins() -> Self {
        let mut table = Self::empty();
        table.register("percentage", |args| unary(args, "percentage", percentage));
        table.register("ceil", |args| unary(args, "ceil", |n| round_with(n, f64::ceil)));
        table.register("floor", |args| unary(args, "floor", |n| round_with(n, f64::floor)));
        table.register("round", |args| unary(args, "round", |n| round_with(n, f64::round)));
        table.register("rgba", rgba);
        table.register("lighten", |args| adjust(args, "lighten", |hsl, n| hsl.l += n / 100.0));
        table.register("darken", |args| adjust(args, "darken", |hsl, n| hsl.l -= n / 100.0));
        table.register("saturate", |args| adjust(args, "saturate", |hsl, n| hsl.s += n / 100.0));
        table.register("desaturate", |args| {
            adjust(args, "desaturate", |hsl, n| hsl.s -= n / 100.0)
        });
        table.register("adjust-hue", |args| adjust(args, "adjust-hue", |hsl, n| hsl.h += n));
        table
    }

    pub fn register<F>(&mut self, name: impl Into<String>, function: F)
    where
        F: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Box::new(function));
    }

    pub fn get(&self, name: &str) -> Option<&BuiltinFn> {
        self.functions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }
}

impl Default for FunctionTable {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for FunctionTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.functions.keys().collect();
        names.sort();
        f.debug_struct("FunctionTable").field("functions", &names).finish()
    }
}

/// Applies `op` to a single numeric argument. Anything else is written
/// back out as the original call.
fn unary(args: &[Value], name: &str, op: impl Fn(&UnitValue) -> UnitValue) -> Value {
    match args {
        [Value::Unit(unit)] => Value::Unit(op(unit)),
        _ => echo(name, args),
    }
}

/// The call as written, for arguments a builtin does not handle.
fn echo(name: &str, args: &[Value]) -> Value {
    let joined = args
        .iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    Value::String(format!("{name}({joined})"))
}

fn percentage(unit: &UnitValue) -> UnitValue {
    UnitValue::new(unit.number * 100.0, "%")
}

fn round_with(unit: &UnitValue, f: fn(f64) -> f64) -> UnitValue {
    UnitValue {
        number: f(unit.number),
        unit: unit.unit.clone(),
    }
}

/// Hue in degrees, saturation and lightness in `0..=1`.
#[derive(Clone, Copy, Debug)]
struct Hsl {
    h: f64,
    s: f64,
    l: f64,
}

impl Hsl {
    fn from_rgb([r, g, b]: [u8; 3]) -> Self {
        let (r, g, b) = (f64::from(r) / 255.0, f64::from(g) / 255.0, f64::from(b) / 255.0);
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let l = (max + min) / 2.0;
        let d = max - min;
        if d == 0.0 {
            return Self { h: 0.0, s: 0.0, l };
        }
        let s = if l > 0.5 { d / (2.0 - max - min) } else { d / (max + min) };
        let h = if max == r {
            (g - b) / d + if g < b { 6.0 } else { 0.0 }
        } else if max == g {
            (b - r) / d + 2.0
        } else {
            (r - g) / d + 4.0
        };
        Self { h: h * 60.0, s, l }
    }

    fn to_rgb(self) -> [u8; 3] {
        let h = self.h.rem_euclid(360.0) / 360.0;
        let s = self.s.clamp(0.0, 1.0);
        let l = self.l.clamp(0.0, 1.0);
        let q = if l <= 0.5 { l * (1.0 + s) } else { l + s - l * s };
        let p = 2.0 * l - q;
        let channel = |t: f64| {
            let t = t.rem_euclid(1.0);
            let v = if t < 1.0 / 6.0 {
                p + (q - p) * 6.0 * t
            } else if t < 0.5 {
                q
            } else if t < 2.0 / 3.0 {
                p + (q - p) * (2.0 / 3.0 - t) * 6.0
            } else {
                p
            };
            (v * 255.0).round() as u8
        };
        [channel(h + 1.0 / 3.0), channel(h), channel(h - 1.0 / 3.0)]
    }
}

fn parse_color(value: &Value) -> Option<Color> {
    match value {
        Value::String(text) => text.parse().ok(),
        _ => None,
    }
}

fn write_color([r, g, b]: [u8; 3], alpha: u8) -> Value {
    if alpha == 255 {
        Value::String(format!("#{r:02x}{g:02x}{b:02x}"))
    } else {
        let alpha = UnitValue::number((f64::from(alpha) / 255.0 * 100.0).round() / 100.0);
        Value::String(format!("rgba({r}, {g}, {b}, {alpha})"))
    }
}

/// `rgba(#hex, alpha)`. Every other form is written back unchanged.
fn rgba(args: &[Value]) -> Value {
    let hex = matches!(args.first(), Some(Value::String(text)) if text.starts_with('#'));
    match (args, hex) {
        ([color, Value::Unit(alpha)], true) => match parse_color(color) {
            Some(color) => {
                let [r, g, b, _] = color.to_rgba8();
                Value::String(format!("rgba({r}, {g}, {b}, {alpha})"))
            }
            None => echo("rgba", args),
        },
        _ => echo("rgba", args),
    }
}

/// Shifts one HSL component of a color by the numeric second argument.
fn adjust(args: &[Value], name: &str, op: impl Fn(&mut Hsl, f64)) -> Value {
    let [color, Value::Unit(amount)] = args else {
        return echo(name, args);
    };
    let Some(color) = parse_color(color) else {
        return echo(name, args);
    };
    let [r, g, b, a] = color.to_rgba8();
    let mut hsl = Hsl::from_rgb([r, g, b]);
    op(&mut hsl, amount.number);
    write_color(hsl.to_rgb(), a)
}
