use super::*;

const SPS: &[u8] = &[0x67, 0x4d, 0x40, 0x1e, 0xaa, 0xbb];
const PPS: &[u8] = &[0x68, 0xee, 0x3c, 0x80];
const AUD: &[u8] = &[0x09, 0xf0];
const IDR: &[u8] = &[0x65, 0x88, 0x84, 0x21];
const P1: &[u8] = &[0x41, 0x9a, 0x02, 0x03];

fn stream(units: &[&[u8]]) -> Vec<u8> {
    let mut out = Vec::new();
    for (i, u) in units.iter().enumerate() {
        if i % 2 == 0 {
            out.extend_from_slice(&[0, 0, 0, 1]);
        } else {
            out.extend_from_slice(&[0, 0, 1]);
        }
        out.extend_from_slice(u);
    }
    out
}

#[test]
fn splits_both_start_code_lengths() {
    let s = stream(&[SPS, PPS, IDR]);
    let nals = split_nals(&s);
    assert_eq!(nals, vec![SPS, PPS, IDR]);
    assert_eq!(nal_type(nals[2]), NAL_IDR);
}

#[test]
fn garbage_without_start_codes_yields_nothing() {
    assert!(split_nals(&[1, 2, 3, 4, 5]).is_empty());
    assert!(split_nals(&[]).is_empty());
}

#[test]
fn groups_on_delimiters_and_strips_parameter_sets() {
    let s = stream(&[AUD, SPS, PPS, IDR, AUD, P1, AUD, P1]);
    let aus = access_units(&s);
    assert_eq!(aus.len(), 3);

    assert!(aus[0].is_key);
    assert_eq!(aus[0].sps, vec![SPS.to_vec()]);
    assert_eq!(aus[0].pps, vec![PPS.to_vec()]);
    let mut want = (IDR.len() as u32).to_be_bytes().to_vec();
    want.extend_from_slice(IDR);
    assert_eq!(aus[0].sample, want);

    assert!(!aus[1].is_key);
    assert!(aus[1].sps.is_empty());
    assert_eq!(aus[1].sample.len(), 4 + P1.len());
}

#[test]
fn groups_on_first_slice_without_delimiters() {
    let s = stream(&[SPS, PPS, IDR, P1, P1]);
    let aus = access_units(&s);
    assert_eq!(aus.len(), 3);
    assert!(aus[0].is_key);
    assert!(!aus[2].is_key);
}

#[test]
fn avcc_record_layout() {
    let rec = build_avcc(&[SPS.to_vec()], &[PPS.to_vec()]).unwrap();
    assert_eq!(&rec[..6], &[1, 0x4d, 0x40, 0x1e, 0xff, 0xe1]);
    assert_eq!(&rec[6..8], &(SPS.len() as u16).to_be_bytes());
    assert_eq!(&rec[8..8 + SPS.len()], SPS);
    let p = 8 + SPS.len();
    assert_eq!(rec[p], 1);
    assert_eq!(&rec[p + 1..p + 3], &(PPS.len() as u16).to_be_bytes());
    assert_eq!(&rec[p + 3..], PPS);
}

#[test]
fn avcc_requires_parameter_sets() {
    assert!(build_avcc(&[], &[PPS.to_vec()]).is_err());
    assert!(build_avcc(&[SPS.to_vec()], &[]).is_err());
    assert!(build_avcc(&[vec![0x67, 1]], &[PPS.to_vec()]).is_err());
}
