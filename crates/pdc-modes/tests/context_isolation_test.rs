//! Distinct contexts used from different threads must produce exactly what a
//! single-threaded run produces.

use std::thread;

use pdc_ciphers::{AES_DECRYPT, AES_ENCRYPT};
use pdc_modes::{cbc_encrypt, ctr, xts_encrypt, CmacContext, ModeDescriptor, XtsTweak};
use rand::{Rng, SeedableRng};

fn message(seed: u64, len: usize) -> Vec<u8> {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    (0..len).map(|_| rng.gen()).collect()
}

fn run_stream(d: &ModeDescriptor<pdc_ciphers::Aes>, key: &[u8], iv: &[u8], msg: &[u8]) -> Vec<u8> {
    let mut ctx = d.init(key, iv).unwrap();
    let mut out = msg.to_vec();
    // many small calls maximise the number of feedback-state updates
    for chunk in out.chunks_mut(13) {
        ctx.transform_in_place(chunk).unwrap();
    }
    out
}

#[test]
fn mode_contexts_isolated_across_threads() {
    let ctr_mode = ctr(AES_ENCRYPT);
    let cbc_mode = cbc_encrypt(AES_ENCRYPT);
    let msg = message(7, 4096);

    let baseline_a = run_stream(&ctr_mode, &[1u8; 16], &[2u8; 16], &msg);
    let mut cbc = cbc_mode.init(&[3u8; 32], &[4u8; 16]).unwrap();
    let mut baseline_b = msg.clone();
    cbc.transform_in_place(&mut baseline_b).unwrap();

    thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                for _ in 0..8 {
                    assert_eq!(run_stream(&ctr_mode, &[1u8; 16], &[2u8; 16], &msg), baseline_a);
                }
            });
            s.spawn(|| {
                for _ in 0..8 {
                    let mut ctx = cbc_mode.init(&[3u8; 32], &[4u8; 16]).unwrap();
                    let mut buf = msg.clone();
                    ctx.transform_in_place(&mut buf).unwrap();
                    assert_eq!(buf, baseline_b);
                }
            });
        }
    });
}

#[test]
fn xts_context_shared_with_per_thread_tweaks() {
    // the context is read-only during transform, so it can be shared by
    // reference as long as every thread owns its tweak
    let ctx = xts_encrypt(AES_ENCRYPT, AES_ENCRYPT)
        .init(&[0x11; 32], &[0x22; 32])
        .unwrap();
    let sectors: Vec<[u8; 16]> = (0u8..8).map(|i| [i; 16]).collect();
    let msg = message(11, 512);

    let baseline: Vec<Vec<u8>> = sectors
        .iter()
        .map(|sector| {
            let mut tweak = XtsTweak::new();
            ctx.set_tweak(&mut tweak, sector).unwrap();
            let mut buf = msg.clone();
            ctx.transform_in_place(&mut tweak, &mut buf).unwrap();
            buf
        })
        .collect();

    thread::scope(|s| {
        for (sector, expected) in sectors.iter().zip(&baseline) {
            let ctx = &ctx;
            let msg = &msg;
            s.spawn(move || {
                let mut tweak = XtsTweak::new();
                ctx.set_tweak(&mut tweak, sector).unwrap();
                let mut buf = msg.clone();
                ctx.transform_in_place(&mut tweak, &mut buf).unwrap();
                assert_eq!(&buf, expected);
            });
        }
    });
}

#[test]
fn cmac_contexts_isolated_across_threads() {
    let mode = cbc_encrypt(AES_ENCRYPT);
    let msg = message(3, 1000);
    let mut expected = [0u8; 16];
    pdc_modes::cmac(&mode, &[9u8; 16], &msg, &mut expected).unwrap();

    thread::scope(|s| {
        for t in 0..4usize {
            let mode = &mode;
            let msg = &msg;
            s.spawn(move || {
                let mut ctx = CmacContext::init(mode, &[9u8; 16]).unwrap();
                for chunk in msg.chunks(17 + t) {
                    ctx.update(chunk).unwrap();
                }
                ctx.verify(&expected).unwrap();
            });
        }
    });
    // decrypt direction keeps working alongside
    assert!(pdc_modes::cbc_decrypt(AES_DECRYPT).init(&[0u8; 16], &[0u8; 16]).is_ok());
}
