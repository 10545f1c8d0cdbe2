use crate::{
    error::{runtime_error, Result},
    runtime::Value,
    tokenizer::Token,
};
use std::{
    cell::RefCell,
    collections::HashMap,
    fmt::{self, Debug, Formatter},
    rc::Rc,
};

/// Handle to one scope in a chain of scopes. Cloning the handle shares the
/// scope, which is how closures keep their defining scope alive.
#[derive(Clone, Default)]
pub struct Environment(Rc<RefCell<Scope>>);

#[derive(Default)]
struct Scope {
    values: HashMap<String, Value>,
    enclosing: Option<Environment>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a child scope whose parent is `self`.
    pub fn extend(&self) -> Self {
        Environment(Rc::new(RefCell::new(Scope {
            values: HashMap::new(),
            enclosing: Some(self.clone()),
        })))
    }

    pub fn enclosing(&self) -> Option<Environment> {
        self.0.borrow().enclosing.clone()
    }

    /// Binds `name` in this scope, replacing any existing binding here.
    pub fn define(&self, name: impl Into<String>, value: Value) {
        self.0.borrow_mut().values.insert(name.into(), value);
    }

    pub fn get(&self, name: &Token) -> Result<Value> {
        let mut scope = self.clone();

        loop {
            if let Some(value) = scope.0.borrow().values.get(&name.lexeme) {
                return Ok(value.clone());
            }

            match scope.enclosing() {
                Some(enclosing) => scope = enclosing,
                None => return undefined(name),
            }
        }
    }

    /// Updates the nearest existing binding of `name`. Never creates one.
    pub fn assign(&self, name: &Token, value: Value) -> Result<()> {
        let mut scope = self.clone();

        loop {
            if let Some(slot) = scope.0.borrow_mut().values.get_mut(&name.lexeme) {
                *slot = value;
                return Ok(());
            }

            match scope.enclosing() {
                Some(enclosing) => scope = enclosing,
                None => return undefined(name),
            }
        }
    }

    pub fn contains_local(&self, name: &str) -> bool {
        self.0.borrow().values.contains_key(name)
    }

    pub fn ptr_eq(&self, other: &Environment) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Number of scopes between this one and the global scope.
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut scope = self.enclosing();

        while let Some(enclosing) = scope {
            depth += 1;
            scope = enclosing.enclosing();
        }

        depth
    }
}

fn undefined<T>(name: &Token) -> Result<T> {
    runtime_error(name.line, format!("Undefined variable '{}'.", name.lexeme))
}

// Values may hold closures that point back at this scope, so only the names
// are printed.
impl Debug for Environment {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let scope = self.0.borrow();
        let mut names: Vec<_> = scope.values.keys().collect();
        names.sort();

        f.debug_struct("Environment")
            .field("names", &names)
            .field("depth", &self.depth())
            .finish()
    }
}
