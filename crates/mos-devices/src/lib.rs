pub mod mos;
