pub mod stgcn;
