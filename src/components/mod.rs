pub mod annotation;
pub mod brush;
pub mod lasso;
pub mod sam;
pub mod tools;
