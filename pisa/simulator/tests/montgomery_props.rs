use pisa_sim::{montgomery_add, montgomery_mul};
use proptest::prelude::*;

// NTT-friendly moduli with q ≡ 1 (mod 2^16), for which the k = q - 2
// reduction is an exact Montgomery reduction with R = 2^32.
const PRIMES: [u32; 4] = [65537, 786433, 7340033, 23068673];

fn mod_pow(mut base: u64, mut exp: u64, modulus: u64) -> u64 {
    let mut acc = 1u64;
    base %= modulus;
    while exp > 0 {
        if exp & 1 == 1 {
            acc = ((acc as u128 * base as u128) % modulus as u128) as u64;
        }
        base = ((base as u128 * base as u128) % modulus as u128) as u64;
        exp >>= 1;
    }
    acc
}

fn reference_montgomery_mul(a: u32, b: u32, q: u32) -> u32 {
    let q = u64::from(q);
    let r = (1u64 << 32) % q;
    // q prime, so R^{-1} = R^{q-2} mod q.
    let r_inv = mod_pow(r, q - 2, q);
    let product = (u128::from(a) * u128::from(b)) % u128::from(q);
    ((product * u128::from(r_inv)) % u128::from(q)) as u32
}

fn inputs() -> impl Strategy<Value = (u32, u32, u32)> {
    (prop::sample::select(PRIMES.to_vec()), any::<u32>(), any::<u32>())
        .prop_map(|(q, a, b)| (a % q, b % q, q))
}

proptest! {
    #[test]
    fn montgomery_mul_matches_algebraic_reference((a, b, q) in inputs()) {
        let result = montgomery_mul(a, b, q);
        prop_assert!(result < q);
        prop_assert_eq!(result, reference_montgomery_mul(a, b, q));
    }

    #[test]
    fn montgomery_add_matches_plain_sum((a, b, q) in inputs()) {
        let result = montgomery_add(a, b, q);
        prop_assert!(result < q);
        prop_assert_eq!(u64::from(result), (u64::from(a) + u64::from(b)) % u64::from(q));
    }
}
