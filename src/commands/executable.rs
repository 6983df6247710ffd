use crate::config::Role;
use crate::frame::Frame;
use crate::store::Store;
use crate::Error;

/// Everything a command may touch while executing.
#[derive(Clone)]
pub struct Context {
    pub store: Store,
    pub role: Role,
}

impl Context {
    pub fn new(store: Store, role: Role) -> Context {
        Context { store, role }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new(Store::new(), Role::Master)
    }
}

pub trait Executable {
    fn exec(self, ctx: &Context) -> Result<Frame, Error>;
}
