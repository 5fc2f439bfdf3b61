//! Well-known index groups used for symbol discovery and batched reads, as defined
//! [here](https://infosys.beckhoff.com/content/1033/tc3_ads_intro/117241867.html?id=1944752650545554679)
//! and [here](https://github.com/Beckhoff/ADS/blob/master/AdsLib/standalone/AdsDef.h).

/// Upload the symbol table.  Index offset is 0, read length is the table
/// size reported by `SYM_UPLOAD_INFO2`.
pub const SYM_UPLOAD: u32 = 0xF00B;
/// Read symbol and data type counts and sizes (0x30 bytes).  Index offset is 0.
pub const SYM_UPLOAD_INFO2: u32 = 0xF00F;

/// Combine multiple index group/offset reads.  Index offset is the number of
/// reads; use with a `write_read` transaction.
pub const SUMUP_READ: u32 = 0xF080;

/// Size of the `SYM_UPLOAD_INFO2` reply.
pub const SYM_UPLOAD_INFO2_LEN: u32 = 0x30;
