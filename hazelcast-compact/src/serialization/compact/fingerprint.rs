//! 64-bit Rabin fingerprint used as the compact schema id.
//!
//! The table and folding order match the Java and .NET clients bit for bit,
//! so a schema built here has the same id everywhere in the cluster.

use super::field_kind::FieldKind;

/// Seed of the fingerprint table and initial value of a schema fingerprint.
pub const INIT: u64 = 0xc15d_213a_a4d7_a795;

static TABLE: [u64; 256] = build_table();

const fn build_table() -> [u64; 256] {
    let mut table = [0u64; 256];
    let mut i = 0;
    while i < 256 {
        let mut fp = i as u64;
        let mut j = 0;
        while j < 8 {
            fp = (fp >> 1) ^ (INIT & (fp & 1).wrapping_neg());
            j += 1;
        }
        table[i] = fp;
        i += 1;
    }
    table
}

/// Folds one byte into `fp`.
pub fn fold_byte(fp: u64, b: u8) -> u64 {
    (fp >> 8) ^ TABLE[((fp ^ b as u64) & 0xff) as usize]
}

/// Folds the four bytes of `v`, least significant first.
pub fn fold_int(fp: u64, v: i32) -> u64 {
    v.to_le_bytes().iter().fold(fp, |fp, &b| fold_byte(fp, b))
}

/// Folds the UTF-8 length of `s` as an int, then its bytes.
pub fn fold_str(fp: u64, s: &str) -> u64 {
    let bytes = s.as_bytes();
    let fp = fold_int(fp, bytes.len() as i32);
    bytes.iter().fold(fp, |fp, &b| fold_byte(fp, b))
}

/// Computes the schema id of a type.
///
/// `fields` must already be in name order.
pub fn schema_fingerprint<'a, I>(type_name: &str, field_count: usize, fields: I) -> i64
where
    I: IntoIterator<Item = (&'a str, FieldKind)>,
{
    let mut fp = fold_str(INIT, type_name);
    fp = fold_int(fp, field_count as i32);
    for (name, kind) in fields {
        fp = fold_str(fp, name);
        fp = fold_int(fp, kind.id());
    }
    fp as i64
}
