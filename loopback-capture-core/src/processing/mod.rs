pub mod analyser;
pub mod gain;
pub mod graph;
pub mod mixdown;
pub mod ring_buffer;
