mod core;


pub use self::core::{Backend, ByteClassScanner, MAX_STOPS, TABLE_WIDTH, VECTOR_WIDTH};
