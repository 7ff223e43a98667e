//! PackBits run-length coding as used by PSD channel data.

/// Decodes one PackBits-compressed row.
///
/// Control byte `c`: `0..=127` copies the next `c + 1` literal bytes,
/// `-127..=-1` repeats the next byte `1 - c` times, `-128` is a no-op.
/// Decoding stops at `expected_len` output bytes or when the input runs out;
/// a short row is zero-padded to `expected_len`.
pub fn decode_rle(src: &[u8], expected_len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(expected_len);
    let mut i = 0;
    while i < src.len() && out.len() < expected_len {
        let c = src[i] as i8;
        i += 1;
        if c >= 0 {
            let n = c as usize + 1;
            let end = (i + n).min(src.len());
            out.extend_from_slice(&src[i..end]);
            i = end;
        } else if c != -128 {
            let Some(&b) = src.get(i) else { break };
            i += 1;
            let n = (1 - c as i16) as usize;
            out.extend(std::iter::repeat_n(b, n));
        }
    }
    out.resize(expected_len, 0);
    out
}

/// Encodes a row with PackBits. Runs of 2 or more equal bytes become repeat
/// packets, everything else goes into literal packets of at most 128 bytes.
pub fn encode_packbits(row: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(row.len() + row.len() / 128 + 1);
    let mut literal: Vec<u8> = Vec::with_capacity(128);
    let mut i = 0;

    let flush = |literal: &mut Vec<u8>, out: &mut Vec<u8>| {
        if !literal.is_empty() {
            out.push((literal.len() - 1) as u8);
            out.extend_from_slice(literal);
            literal.clear();
        }
    };

    while i < row.len() {
        let b = row[i];
        let mut run = 1;
        while i + run < row.len() && row[i + run] == b && run < 128 {
            run += 1;
        }
        if run >= 2 {
            flush(&mut literal, &mut out);
            out.push((1i16 - run as i16) as i8 as u8);
            out.push(b);
            i += run;
        } else {
            literal.push(b);
            if literal.len() == 128 {
                flush(&mut literal, &mut out);
            }
            i += 1;
        }
    }
    flush(&mut literal, &mut out);
    out
}
