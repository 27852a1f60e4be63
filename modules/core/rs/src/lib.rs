pub mod loc;
pub mod nucleotide;
pub mod reference;
