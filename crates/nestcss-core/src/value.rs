//! Value trees.
//!
//! Values are immutable once parsed. Evaluation always builds new values
//! rather than rewriting the tree it was handed.

use std::fmt;

use crate::error::{CompileError, Result};

/// The dimension family a unit belongs to. Arithmetic compatibility is
/// decided on this, not on the unit name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnitKind {
    Number,
    Length,
    Percentage,
    Angle,
    Time,
    Frequency,
    Resolution,
    Unknown,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Unit {
    pub name: String,
    pub kind: UnitKind,
}

impl Unit {
    pub fn number() -> Self {
        Self {
            name: String::new(),
            kind: UnitKind::Number,
        }
    }

    pub fn parse(name: &str) -> Self {
        let kind = match name.to_ascii_lowercase().as_str() {
            "" => UnitKind::Number,
            "%" => UnitKind::Percentage,
            "px" | "em" | "rem" | "ex" | "ch" | "cap" | "ic" | "lh" | "rlh" | "vw" | "vh"
            | "vi" | "vb" | "vmin" | "vmax" | "dvw" | "dvh" | "svw" | "svh" | "lvw" | "lvh"
            | "cqw" | "cqh" | "cqi" | "cqb" | "cqmin" | "cqmax" | "cm" | "mm" | "q" | "in"
            | "pc" | "pt" => UnitKind::Length,
            "deg" | "grad" | "rad" | "turn" => UnitKind::Angle,
            "s" | "ms" => UnitKind::Time,
            "hz" | "khz" => UnitKind::Frequency,
            "dpi" | "dpcm" | "dppx" | "x" => UnitKind::Resolution,
            _ => UnitKind::Unknown,
        };
        Self {
            name: name.to_string(),
            kind,
        }
    }
}

/// A number with an optional unit suffix, e.g. `60px` or `6.5em`.
#[derive(Clone, Debug, PartialEq)]
pub struct UnitValue {
    pub number: f64,
    pub unit: Unit,
}

impl UnitValue {
    pub fn new(number: f64, unit: &str) -> Self {
        Self {
            number,
            unit: Unit::parse(unit),
        }
    }

    pub fn number(number: f64) -> Self {
        Self {
            number,
            unit: Unit::number(),
        }
    }

    pub fn kind(&self) -> UnitKind {
        self.unit.kind
    }
}

impl fmt::Display for UnitValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_number(f, self.number)?;
        f.write_str(&self.unit.name)
    }
}

fn write_number(f: &mut fmt::Formatter<'_>, number: f64) -> fmt::Result {
    if number.fract() == 0.0 && number.abs() < 1e15 {
        write!(f, "{}", number as i64)
    } else {
        // Trim float noise such as 0.30000000000000004.
        let rounded = (number * 1e6).round() / 1e6;
        write!(f, "{rounded}")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Separator {
    Space,
    Comma,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ValueList {
    pub items: Vec<Value>,
    pub separator: Separator,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Function {
    pub name: String,
    pub args: Box<Value>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Variable {
    pub symbol: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Mod,
    Equals,
    NotEquals,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl BinaryOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Mod => "%",
            BinaryOperator::Equals => "==",
            BinaryOperator::NotEquals => "!=",
            BinaryOperator::Gt => ">",
            BinaryOperator::Gte => ">=",
            BinaryOperator::Lt => "<",
            BinaryOperator::Lte => "<=",
        }
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOperator::Equals
                | BinaryOperator::NotEquals
                | BinaryOperator::Gt
                | BinaryOperator::Gte
                | BinaryOperator::Lt
                | BinaryOperator::Lte
        )
    }

    /// Binding strength; higher binds tighter.
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOperator::Multiply | BinaryOperator::Divide | BinaryOperator::Mod => 3,
            BinaryOperator::Add | BinaryOperator::Subtract => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Expression {
    pub left: Value,
    pub op: BinaryOperator,
    pub right: Value,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Unit(UnitValue),
    /// Identifiers, keywords, hex colors, quoted strings (quotes kept), urls.
    String(String),
    List(ValueList),
    Function(Function),
    Variable(Variable),
    Expression(Box<Expression>),
    /// Parts written back to back with no separator, e.g. `#{$i}px` or `12px/1.5`.
    Interpolated(Vec<Value>),
    Boolean(bool),
    /// Placeholder for a variable that did not resolve.
    Undefined(String),
}

impl Value {
    pub fn string(text: impl Into<String>) -> Self {
        Value::String(text.into())
    }

    pub fn variable(symbol: impl Into<String>) -> Self {
        Value::Variable(Variable {
            symbol: symbol.into(),
        })
    }

    pub fn number(number: f64) -> Self {
        Value::Unit(UnitValue::number(number))
    }

    pub fn unit(number: f64, unit: &str) -> Self {
        Value::Unit(UnitValue::new(number, unit))
    }

    pub fn list(items: Vec<Value>, separator: Separator) -> Self {
        Value::List(ValueList { items, separator })
    }

    pub fn expression(left: Value, op: BinaryOperator, right: Value) -> Self {
        Value::Expression(Box::new(Expression { left, op, right }))
    }

    /// Wraps several space separated components, collapsing the single case.
    pub fn from_components(mut components: Vec<Value>) -> Self {
        if components.len() == 1 {
            components.remove(0)
        } else {
            Value::list(components, Separator::Space)
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined(_))
    }

    /// Rebuilds the tree with every variable passed through `replace`.
    pub fn map_variables<F>(&self, replace: &mut F) -> Result<Value>
    where
        F: FnMut(&Variable) -> Result<Option<Value>>,
    {
        Ok(match self {
            Value::Variable(variable) => match replace(variable)? {
                Some(value) => value,
                None => self.clone(),
            },
            Value::List(list) => Value::List(ValueList {
                items: list
                    .items
                    .iter()
                    .map(|item| item.map_variables(replace))
                    .collect::<Result<_>>()?,
                separator: list.separator,
            }),
            Value::Function(function) => Value::Function(Function {
                name: function.name.clone(),
                args: Box::new(function.args.map_variables(replace)?),
            }),
            Value::Expression(expr) => Value::expression(
                expr.left.map_variables(replace)?,
                expr.op,
                expr.right.map_variables(replace)?,
            ),
            Value::Interpolated(parts) => Value::Interpolated(
                parts
                    .iter()
                    .map(|part| part.map_variables(replace))
                    .collect::<Result<_>>()?,
            ),
            other => other.clone(),
        })
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit(unit) => unit.fmt(f),
            Value::String(text) => f.write_str(text),
            Value::List(list) => {
                let separator = match list.separator {
                    Separator::Space => " ",
                    Separator::Comma => ", ",
                };
                for (i, item) in list.items.iter().enumerate() {
                    if i != 0 {
                        f.write_str(separator)?;
                    }
                    item.fmt(f)?;
                }
                Ok(())
            }
            Value::Function(function) => write!(f, "{}({})", function.name, function.args),
            Value::Variable(variable) => write!(f, "${}", variable.symbol),
            Value::Expression(expr) => write!(f, "{} {} {}", expr.left, expr.op, expr.right),
            Value::Interpolated(parts) => {
                for part in parts {
                    match part {
                        Value::String(_) | Value::Unit(_) => part.fmt(f)?,
                        other => write!(f, "#{{{other}}}")?,
                    }
                }
                Ok(())
            }
            Value::Boolean(flag) => write!(f, "{flag}"),
            Value::Undefined(name) => write!(f, "/* ${name} not found */"),
        }
    }
}

/// Whether `op` may combine operands of these kinds.
pub fn are_compatible(left: UnitKind, right: UnitKind, op: BinaryOperator) -> bool {
    match op {
        BinaryOperator::Divide => false,
        BinaryOperator::Add | BinaryOperator::Subtract => left == right,
        BinaryOperator::Multiply => {
            left == right
                || matches!(left, UnitKind::Number | UnitKind::Percentage)
                || matches!(right, UnitKind::Number | UnitKind::Percentage)
        }
        BinaryOperator::Mod => right == UnitKind::Number,
        _ => true,
    }
}

/// Applies an arithmetic operator to two unit values.
pub fn apply_arithmetic(left: &UnitValue, op: BinaryOperator, right: &UnitValue) -> Result<Value> {
    if op.is_comparison() || !are_compatible(left.kind(), right.kind(), op) {
        return Err(CompileError::TypeIncompatible {
            op,
            left: left.to_string(),
            right: right.to_string(),
        });
    }
    let unit = if left.kind() == UnitKind::Number && op != BinaryOperator::Mod {
        right.unit.clone()
    } else {
        left.unit.clone()
    };
    let number = match op {
        BinaryOperator::Add => left.number + right.number,
        BinaryOperator::Subtract => left.number - right.number,
        BinaryOperator::Multiply => left.number * right.number,
        BinaryOperator::Mod => left.number % right.number,
        // Rejected by the compatibility check above.
        _ => {
            return Err(CompileError::TypeIncompatible {
                op,
                left: left.to_string(),
                right: right.to_string(),
            })
        }
    };
    Ok(Value::Unit(UnitValue { number, unit }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_print_without_trailing_zeroes() {
        assert_eq!(Value::unit(80.0, "px").to_string(), "80px");
        assert_eq!(Value::number(0.6).to_string(), "0.6");
        assert_eq!(Value::unit(1.5, "em").to_string(), "1.5em");
        assert_eq!(Value::number(0.1 + 0.2).to_string(), "0.3");
        assert_eq!(Value::unit(-10.0, "px").to_string(), "-10px");
    }

    #[test]
    fn unit_kinds() {
        assert_eq!(Unit::parse("px").kind, UnitKind::Length);
        assert_eq!(Unit::parse("%").kind, UnitKind::Percentage);
        assert_eq!(Unit::parse("ms").kind, UnitKind::Time);
        assert_eq!(Unit::parse("").kind, UnitKind::Number);
        assert_eq!(Unit::parse("furlong").kind, UnitKind::Unknown);
    }

    #[test]
    fn compatibility_rules() {
        use UnitKind::*;
        assert!(!are_compatible(Number, Number, BinaryOperator::Divide));
        assert!(are_compatible(Length, Length, BinaryOperator::Add));
        assert!(!are_compatible(Length, Time, BinaryOperator::Subtract));
        assert!(are_compatible(Number, Angle, BinaryOperator::Multiply));
        assert!(!are_compatible(Length, Time, BinaryOperator::Multiply));
        assert!(are_compatible(Length, Number, BinaryOperator::Mod));
        assert!(!are_compatible(Length, Length, BinaryOperator::Mod));
    }

    #[test]
    fn arithmetic_keeps_the_dimension() {
        let ten = UnitValue::new(10.0, "px");
        let two = UnitValue::number(2.0);
        assert_eq!(
            apply_arithmetic(&two, BinaryOperator::Multiply, &ten).unwrap(),
            Value::unit(20.0, "px")
        );
        assert_eq!(
            apply_arithmetic(&ten, BinaryOperator::Add, &UnitValue::new(5.0, "px")).unwrap(),
            Value::unit(15.0, "px")
        );
        assert_eq!(
            apply_arithmetic(&UnitValue::new(7.0, "px"), BinaryOperator::Mod, &two).unwrap(),
            Value::unit(1.0, "px")
        );
    }

    #[test]
    fn incompatible_arithmetic_is_an_error() {
        let px = UnitValue::new(10.0, "px");
        let ms = UnitValue::new(10.0, "ms");
        let err = apply_arithmetic(&px, BinaryOperator::Add, &ms).unwrap_err();
        assert!(matches!(err, CompileError::TypeIncompatible { .. }));
        assert!(apply_arithmetic(&px, BinaryOperator::Divide, &px).is_err());
    }

    #[test]
    fn display_lists_and_functions() {
        let args = Value::list(
            vec![Value::number(255.0), Value::number(0.0), Value::number(0.5)],
            Separator::Comma,
        );
        let func = Value::Function(Function {
            name: "rgba".into(),
            args: Box::new(args),
        });
        assert_eq!(func.to_string(), "rgba(255, 0, 0.5)");
        let interp = Value::Interpolated(vec![Value::unit(12.0, "px"), Value::string("/"), Value::number(1.5)]);
        assert_eq!(interp.to_string(), "12px/1.5");
    }

    #[test]
    fn map_variables_replaces_only_matches() {
        let value = Value::list(
            vec![Value::variable("a"), Value::variable("b")],
            Separator::Space,
        );
        let mapped = value
            .map_variables(&mut |var| {
                Ok((var.symbol == "a").then(|| Value::unit(1.0, "px")))
            })
            .unwrap();
        assert_eq!(mapped.to_string(), "1px $b");
    }
}
