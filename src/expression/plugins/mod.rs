pub mod arithmetic;
pub mod comparison;
pub mod predicate;
