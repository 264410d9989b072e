pub mod prelu;
