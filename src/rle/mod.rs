//! L5: run-length codecs for the foreign formats this toolkit round-trips
//! through (spec §4.2). Each codec is an independent encoder/decoder pair;
//! none shares state with the others.
//!
//! The decoding half of each codec follows `kryptan-pcx`'s
//! `Decompressor<S: io::Read>` idiom: a struct that implements `io::Read`
//! directly, transparently expanding the coded stream as the caller reads
//! from it. Encoding is exposed as a plain buffer-to-buffer function rather
//! than a streaming `Compressor<S: io::Write>`, since every encoder here
//! needs lookahead (a run is only worth emitting once two or more repeats
//! are confirmed) that a byte-at-a-time `Write` impl can't express without
//! internal buffering that would just duplicate the buffer-based form.
pub mod atk;
pub mod compuserve;
pub mod escp2;
pub mod packbits;
pub mod urt;
