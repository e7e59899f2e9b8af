pub mod string;

pub use string::camel_to_snake;
