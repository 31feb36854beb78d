pub(crate) mod limits;
pub(crate) mod run;
pub(crate) mod shared;
pub(crate) mod walk;
