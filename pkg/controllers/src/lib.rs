pub mod policy;
pub mod registrar;
pub mod stream;
pub mod supervisor;
pub mod translator;
