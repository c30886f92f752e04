pub mod converters;

pub use converters::build_converter;
