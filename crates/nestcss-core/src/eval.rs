//! Expression evaluation.

use tracing::trace;

use crate::error::{CompileError, Result};
use crate::functions::FunctionTable;
use crate::scope::Scope;
use crate::session::Session;
use crate::value::{apply_arithmetic, BinaryOperator, Function, Separator, Value};

/// Evaluates values against one scope.
pub struct Evaluator<'a> {
    functions: &'a FunctionTable,
    scope: &'a Scope<'a>,
    session: &'a mut Session,
}

impl<'a> Evaluator<'a> {
    pub fn new(functions: &'a FunctionTable, scope: &'a Scope<'a>, session: &'a mut Session) -> Self {
        Self {
            functions,
            scope,
            session,
        }
    }

    /// Reduces variables, expressions and registered functions to a value.
    /// Everything else comes back unchanged.
    pub fn evaluate(&mut self, value: &Value) -> Result<Value> {
        self.session.descend()?;
        let result = self.evaluate_inner(value);
        self.session.ascend();
        result
    }

    fn evaluate_inner(&mut self, value: &Value) -> Result<Value> {
        match value {
            Value::Variable(variable) => {
                let resolved = self.scope.resolve(&variable.symbol)?;
                self.evaluate(&resolved)
            }
            Value::Expression(expr) => {
                let left = self.evaluate(&expr.left)?;
                let right = self.evaluate(&expr.right)?;
                binary(&left, expr.op, &right)
            }
            Value::Function(function) => self.call(function),
            other => Ok(other.clone()),
        }
    }

    pub fn call(&mut self, function: &Function) -> Result<Value> {
        let Some(builtin) = self.functions.get(&function.name) else {
            return Err(CompileError::FunctionNotRegistered(function.name.clone()));
        };
        let args = self.arguments(&function.args)?;
        trace!(name = %function.name, args = args.len(), "calling function");
        Ok(builtin(&args))
    }

    /// Flattens call arguments. Comma lists split into separate arguments,
    /// space lists stay whole, and variables and expressions are reduced.
    pub fn arguments(&mut self, value: &Value) -> Result<Vec<Value>> {
        match value {
            Value::List(list) if list.separator == Separator::Comma => {
                let mut args = Vec::with_capacity(list.items.len());
                for item in &list.items {
                    args.extend(self.arguments(item)?);
                }
                Ok(args)
            }
            Value::List(list) if list.items.is_empty() => Ok(Vec::new()),
            Value::Variable(_) | Value::Expression(_) => Ok(vec![self.evaluate(value)?]),
            other => Ok(vec![other.clone()]),
        }
    }

    /// Evaluates a value that must be numeric, such as a loop bound.
    pub fn number(&mut self, value: &Value) -> Result<f64> {
        let evaluated = self.evaluate(value)?;
        as_number(&evaluated)
    }
}

/// Only the literal `true` is truthy.
pub fn is_truthy(value: &Value) -> bool {
    matches!(value, Value::Boolean(true))
}

fn binary(left: &Value, op: BinaryOperator, right: &Value) -> Result<Value> {
    if op.is_comparison() {
        return compare(left, op, right);
    }
    match (left, right) {
        (Value::Unit(l), Value::Unit(r)) => apply_arithmetic(l, op, r),
        _ => Err(CompileError::TypeIncompatible {
            op,
            left: left.to_string(),
            right: right.to_string(),
        }),
    }
}

fn compare(left: &Value, op: BinaryOperator, right: &Value) -> Result<Value> {
    let result = match op {
        BinaryOperator::Equals => text(left) == text(right),
        BinaryOperator::NotEquals => text(left) != text(right),
        _ => {
            let (l, r) = (as_number(left)?, as_number(right)?);
            match op {
                BinaryOperator::Gt => l > r,
                BinaryOperator::Gte => l >= r,
                BinaryOperator::Lt => l < r,
                _ => l <= r,
            }
        }
    };
    Ok(Value::Boolean(result))
}

fn text(value: &Value) -> String {
    match value {
        Value::Undefined(_) => "undefined".to_string(),
        other => other.to_string(),
    }
}

fn as_number(value: &Value) -> Result<f64> {
    match value {
        Value::Unit(unit) => Ok(unit.number),
        Value::String(text) => text
            .parse()
            .map_err(|_| CompileError::NotANumber(text.clone())),
        other => Err(CompileError::NotANumber(other.to_string())),
    }
}
