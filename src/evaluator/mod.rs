//! Tree-walking evaluator: the alternative back end over the same AST and
//! value model as the bytecode pipeline.
//!
//! Faults travel as `Value::Error` and `return` unwinds as
//! `Value::ReturnValue`; both stop evaluation at every statement boundary.

pub mod environment;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::{BlockStatement, Expr, ExprKind, Program, Stmt, StmtKind};
use crate::builtins;
use crate::error::RuntimeError;
use crate::evaluator::environment::Environment;
use crate::value::{FunctionValue, HashPair, Value};

/// The tree-walking interpreter.
pub struct Interpreter {
    env: Rc<RefCell<Environment>>,
}

impl Interpreter {
    pub fn new() -> Self {
        Self {
            env: Environment::new(),
        }
    }

    /// Evaluate a program, converting a final error value into a result.
    pub fn interpret(&mut self, program: &Program) -> Result<Value, RuntimeError> {
        match self.eval_program(program) {
            Value::Error(message) => Err(RuntimeError::Message(message)),
            value => Ok(value),
        }
    }

    /// Evaluate a program to its final value. A `return` at the top level
    /// unwraps; an error aborts.
    pub fn eval_program(&mut self, program: &Program) -> Value {
        let env = self.env.clone();
        let mut result = Value::Null;

        for stmt in &program.statements {
            result = eval_statement(stmt, &env);
            match result {
                Value::ReturnValue(value) => return *value,
                Value::Error(_) => return result,
                _ => {}
            }
        }

        result
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

fn eval_statement(stmt: &Stmt, env: &Rc<RefCell<Environment>>) -> Value {
    match &stmt.kind {
        StmtKind::Expression(expr) => eval_expression(expr, env),

        StmtKind::Let { name, value } => {
            let value = eval_expression(value, env);
            if value.is_error() {
                return value;
            }
            env.borrow_mut().set(name, value);
            Value::Null
        }

        StmtKind::Return(expr) => {
            let value = eval_expression(expr, env);
            if value.is_error() {
                return value;
            }
            Value::ReturnValue(Box::new(value))
        }
    }
}

fn eval_block(block: &BlockStatement, env: &Rc<RefCell<Environment>>) -> Value {
    let mut result = Value::Null;

    for stmt in &block.statements {
        result = eval_statement(stmt, env);
        // Returns and errors pass through unwrapped so outer blocks keep
        // unwinding.
        if matches!(result, Value::ReturnValue(_) | Value::Error(_)) {
            return result;
        }
    }

    result
}

fn eval_expression(expr: &Expr, env: &Rc<RefCell<Environment>>) -> Value {
    match &expr.kind {
        ExprKind::IntLiteral(value) => Value::Integer(*value),
        ExprKind::StringLiteral(value) => Value::String(Rc::new(value.clone())),
        ExprKind::BoolLiteral(value) => Value::Boolean(*value),

        ExprKind::Identifier(name) => match env.borrow().get(name) {
            Some(value) => value,
            None => match builtins::lookup(name) {
                Some(builtin) => Value::Builtin(builtin),
                None => Value::Error(format!("identifier not found: {}", name)),
            },
        },

        ExprKind::Prefix { operator, right } => {
            let right = eval_expression(right, env);
            if right.is_error() {
                return right;
            }
            eval_prefix_expression(operator, right)
        }

        ExprKind::Infix {
            left,
            operator,
            right,
        } => {
            let left = eval_expression(left, env);
            if left.is_error() {
                return left;
            }
            let right = eval_expression(right, env);
            if right.is_error() {
                return right;
            }
            eval_infix_expression(operator, left, right)
        }

        ExprKind::If {
            condition,
            consequence,
            alternative,
        } => {
            let condition = eval_expression(condition, env);
            if condition.is_error() {
                return condition;
            }
            if condition.is_truthy() {
                eval_block(consequence, env)
            } else if let Some(alt) = alternative {
                eval_block(alt, env)
            } else {
                Value::Null
            }
        }

        ExprKind::Function {
            parameters, body, ..
        } => Value::Function(Rc::new(FunctionValue {
            parameters: parameters.clone(),
            body: body.clone(),
            env: env.clone(),
        })),

        ExprKind::Call {
            function,
            arguments,
        } => {
            let function = eval_expression(function, env);
            if function.is_error() {
                return function;
            }
            let args = match eval_expressions(arguments, env) {
                Ok(args) => args,
                Err(error) => return error,
            };
            apply_function(function, args)
        }

        ExprKind::Array(elements) => match eval_expressions(elements, env) {
            Ok(elements) => Value::Array(Rc::new(elements)),
            Err(error) => error,
        },

        ExprKind::Hash(pairs) => eval_hash_literal(pairs, env),

        ExprKind::Index { left, index } => {
            let left = eval_expression(left, env);
            if left.is_error() {
                return left;
            }
            let index = eval_expression(index, env);
            if index.is_error() {
                return index;
            }
            eval_index_expression(left, index)
        }
    }
}

fn eval_expressions(
    exprs: &[Expr],
    env: &Rc<RefCell<Environment>>,
) -> Result<Vec<Value>, Value> {
    let mut results = Vec::with_capacity(exprs.len());
    for expr in exprs {
        let value = eval_expression(expr, env);
        if value.is_error() {
            return Err(value);
        }
        results.push(value);
    }
    Ok(results)
}

fn eval_prefix_expression(operator: &str, right: Value) -> Value {
    match operator {
        "!" => Value::Boolean(!right.is_truthy()),
        "-" => match right {
            Value::Integer(n) => Value::Integer(n.wrapping_neg()),
            other => Value::Error(format!("unknown operator: -{}", other.type_name())),
        },
        other => Value::Error(format!("unknown operator: {}{}", other, right.type_name())),
    }
}

fn eval_infix_expression(operator: &str, left: Value, right: Value) -> Value {
    match (&left, &right) {
        (Value::Integer(l), Value::Integer(r)) => {
            eval_integer_infix_expression(operator, *l, *r)
        }
        (Value::String(l), Value::String(r)) if operator == "+" => {
            Value::String(Rc::new(format!("{}{}", l, r)))
        }
        _ => match operator {
            "==" => Value::Boolean(left == right),
            "!=" => Value::Boolean(left != right),
            _ if left.type_name() != right.type_name() => Value::Error(format!(
                "type mismatch: {} {} {}",
                left.type_name(),
                operator,
                right.type_name()
            )),
            _ => Value::Error(format!(
                "unknown operator: {} {} {}",
                left.type_name(),
                operator,
                right.type_name()
            )),
        },
    }
}

fn eval_integer_infix_expression(operator: &str, left: i64, right: i64) -> Value {
    match operator {
        "+" => Value::Integer(left.wrapping_add(right)),
        "-" => Value::Integer(left.wrapping_sub(right)),
        "*" => Value::Integer(left.wrapping_mul(right)),
        "/" => {
            if right == 0 {
                Value::Error("division by zero".to_string())
            } else {
                Value::Integer(left.wrapping_div(right))
            }
        }
        "<" => Value::Boolean(left < right),
        ">" => Value::Boolean(left > right),
        "==" => Value::Boolean(left == right),
        "!=" => Value::Boolean(left != right),
        other => Value::Error(format!("unknown operator: Integer {} Integer", other)),
    }
}

fn apply_function(function: Value, args: Vec<Value>) -> Value {
    match function {
        Value::Function(func) => {
            if args.len() != func.parameters.len() {
                return Value::Error(format!(
                    "wrong number of arguments: want={}, got={}",
                    func.parameters.len(),
                    args.len()
                ));
            }

            let call_env = Environment::enclosed(func.env.clone());
            for (param, arg) in func.parameters.iter().zip(args) {
                call_env.borrow_mut().set(param, arg);
            }

            match eval_block(&func.body, &call_env) {
                Value::ReturnValue(value) => *value,
                other => other,
            }
        }
        Value::Builtin(builtin) => (builtin.func)(&args),
        other => Value::Error(format!("not a function: {}", other.type_name())),
    }
}

fn eval_hash_literal(pairs: &[(Expr, Expr)], env: &Rc<RefCell<Environment>>) -> Value {
    let mut hash = HashMap::with_capacity(pairs.len());

    for (key_expr, value_expr) in pairs {
        let key = eval_expression(key_expr, env);
        if key.is_error() {
            return key;
        }
        let Some(hash_key) = key.hash_key() else {
            return Value::Error(format!("unusable as hash key: {}", key.type_name()));
        };
        let value = eval_expression(value_expr, env);
        if value.is_error() {
            return value;
        }
        hash.insert(hash_key, HashPair { key, value });
    }

    Value::Hash(Rc::new(hash))
}

fn eval_index_expression(left: Value, index: Value) -> Value {
    match (&left, &index) {
        (Value::Array(elements), Value::Integer(i)) => {
            let max = elements.len() as i64 - 1;
            if *i < 0 || *i > max {
                Value::Null
            } else {
                elements[*i as usize].clone()
            }
        }
        (Value::Hash(pairs), _) => match index.hash_key() {
            Some(key) => pairs
                .get(&key)
                .map(|pair| pair.value.clone())
                .unwrap_or(Value::Null),
            None => Value::Error(format!("unusable as hash key: {}", index.type_name())),
        },
        _ => Value::Error(format!(
            "index operator not supported: {}",
            left.type_name()
        )),
    }
}
