use crate::environment::Environment;
use crate::runtime::{Callable, NativeResult, Value};
use rand::Rng;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

fn builtin(name: &str, arity: usize, func: impl Fn(&[Value]) -> NativeResult + 'static) -> Value {
    Value::Callable(Callable::BuiltIn {
        name: name.to_string(),
        arity,
        func: Rc::new(func),
    })
}

fn first<'a>(args: &'a [Value], name: &str) -> Result<&'a Value, String> {
    args.first()
        .ok_or_else(|| format!("{} requires 1 argument", name))
}

/// Binds the native functions into `env`, normally the global scope.
pub fn define_natives(env: &Environment) {
    macro_rules! define_builtin {
        ($name:expr, $arity:expr, $func:expr) => {
            env.define($name, builtin($name, $arity, $func));
        };
    }

    // Time functions
    define_builtin!("clock", 0, |_args: &[Value]| {
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| format!("Time error: {}", e))?;
        Ok(Value::Number(since_epoch.as_secs_f64()))
    });

    define_builtin!("random", 0, |_args: &[Value]| {
        Ok(Value::Number(rand::thread_rng().gen::<f64>()))
    });

    // Type functions
    define_builtin!("type", 1, |args: &[Value]| {
        let arg = first(args, "type")?;
        Ok(Value::String(arg.type_name().to_string()))
    });

    define_builtin!("string", 1, |args: &[Value]| {
        let arg = first(args, "string")?;
        Ok(Value::String(arg.to_string()))
    });

    define_builtin!("number", 1, |args: &[Value]| {
        match first(args, "number")? {
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .map(Value::Number)
                .map_err(|_| format!("Could not convert '{}' to a number.", s)),
            Value::Number(n) => Ok(Value::Number(*n)),
            other => Err(format!(
                "number() takes a string or number, got {}.",
                other.type_name()
            )),
        }
    });

    define_builtin!("len", 1, |args: &[Value]| {
        match first(args, "len")? {
            Value::String(s) => Ok(Value::Number(s.chars().count() as f64)),
            other => Err(format!("len() takes a string, got {}.", other.type_name())),
        }
    });

    // Math functions
    define_builtin!("abs", 1, |args: &[Value]| {
        match first(args, "abs")? {
            Value::Number(n) => Ok(Value::Number(n.abs())),
            other => Err(format!("abs() takes a number, got {}.", other.type_name())),
        }
    });

    define_builtin!("floor", 1, |args: &[Value]| {
        match first(args, "floor")? {
            Value::Number(n) => Ok(Value::Number(n.floor())),
            other => Err(format!("floor() takes a number, got {}.", other.type_name())),
        }
    });

    define_builtin!("sqrt", 1, |args: &[Value]| {
        match first(args, "sqrt")? {
            Value::Number(n) if *n >= 0.0 => Ok(Value::Number(n.sqrt())),
            _ => Err("sqrt() takes a non-negative number.".to_string()),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::{Token, TokenType};

    fn lookup(env: &Environment, name: &str) -> Option<Value> {
        let token = Token {
            token_type: TokenType::Identifier(name.to_string()),
            lexeme: name.to_string(),
            line: 1,
        };
        env.get(&token).ok()
    }

    fn call(env: &Environment, name: &str, args: &[Value]) -> NativeResult {
        match lookup(env, name) {
            Some(Value::Callable(Callable::BuiltIn { func, arity, .. })) => {
                assert_eq!(arity, args.len());
                func(args)
            }
            other => panic!("{} is not a native function: {:?}", name, other),
        }
    }

    #[test]
    fn test_natives_are_defined() {
        let env = Environment::new();
        define_natives(&env);

        for name in [
            "clock", "random", "type", "string", "number", "len", "abs", "floor", "sqrt",
        ] {
            assert!(
                matches!(lookup(&env, name), Some(Value::Callable(_))),
                "{} missing",
                name
            );
        }
    }

    #[test]
    fn test_clock_and_random() -> Result<(), String> {
        let env = Environment::new();
        define_natives(&env);

        match call(&env, "clock", &[])? {
            Value::Number(seconds) => assert!(seconds > 1_600_000_000.0),
            other => panic!("clock returned {:?}", other),
        }

        match call(&env, "random", &[])? {
            Value::Number(n) => assert!((0.0..1.0).contains(&n)),
            other => panic!("random returned {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_conversions() -> Result<(), String> {
        let env = Environment::new();
        define_natives(&env);

        assert_eq!(
            call(&env, "type", &[Value::Number(1.0)])?,
            Value::String("number".to_string())
        );
        assert_eq!(
            call(&env, "type", &[Value::Nil])?,
            Value::String("nil".to_string())
        );
        assert_eq!(
            call(&env, "string", &[Value::Number(3.0)])?,
            Value::String("3".to_string())
        );
        assert_eq!(
            call(&env, "number", &[Value::String(" 2.5 ".to_string())])?,
            Value::Number(2.5)
        );
        assert!(call(&env, "number", &[Value::String("abc".to_string())]).is_err());
        assert_eq!(
            call(&env, "len", &[Value::String("héllo".to_string())])?,
            Value::Number(5.0)
        );
        Ok(())
    }

    #[test]
    fn test_math() -> Result<(), String> {
        let env = Environment::new();
        define_natives(&env);

        assert_eq!(call(&env, "abs", &[Value::Number(-2.0)])?, Value::Number(2.0));
        assert_eq!(call(&env, "floor", &[Value::Number(2.7)])?, Value::Number(2.0));
        assert_eq!(call(&env, "sqrt", &[Value::Number(9.0)])?, Value::Number(3.0));
        assert!(call(&env, "sqrt", &[Value::Number(-1.0)]).is_err());
        assert!(call(&env, "abs", &[Value::Boolean(true)]).is_err());
        Ok(())
    }
}
