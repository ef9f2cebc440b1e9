/// An external NMEA sentence parser, fed one raw byte at a time.
///
/// The driver relays the data stream into `process` and only consults
/// the accessors once `is_valid` reports a complete, checksummed
/// sentence. Units and encodings of the accessor values are the
/// parser's own contract and are copied through untouched.
pub trait SentenceParser {
    /// Accumulate one byte of the sentence stream.
    fn process(&mut self, byte: u8);

    /// Whether the parser currently holds a valid navigation sentence.
    fn is_valid(&self) -> bool;

    fn latitude(&self) -> i32;

    fn longitude(&self) -> i32;

    fn altitude(&self) -> i32;

    fn speed(&self) -> i32;

    fn num_satellites(&self) -> u8;
}
