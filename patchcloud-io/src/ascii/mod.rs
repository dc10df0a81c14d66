mod ascii_reader;
pub use self::ascii_reader::*;

mod ascii_writer;
pub use self::ascii_writer::*;

mod ascii_format_util;
pub(crate) use self::ascii_format_util::*;

#[cfg(test)]
mod test_util;
#[cfg(test)]
pub(crate) use self::test_util::*;
