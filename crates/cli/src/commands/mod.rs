pub(crate) mod generate;
pub(crate) mod parse;
pub(crate) mod run;
pub(crate) mod validate;
