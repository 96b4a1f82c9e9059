//! # Discrete-Log Proxy Signatures
//!
//! Proxy signatures after Mambo, Usuda and Okamoto (MUO '96) over a
//! prime-order subgroup of `Z_p^*`, in the two classic trust variants:
//! "unprotected" partial delegation, where delegator and proxy can both
//! produce valid proxy signatures, and "protected" delegation, where the
//! signing exponent binds the proxy's private key so only the proxy can.
//!
//! ## Protocol Flow
//!
//! 1. Setup: agree on `GroupParameters` `(p, q, g)` with `g` of order `q` mod `p`
//! 2. Delegation: A draws `k`, computes `K = g^k mod p` and
//!    `δ = (x_A + k·K) mod q`; the credential satisfies `g^δ ≡ y_A·K^K (mod p)`
//! 3. Protected variant: the credential is strengthened to
//!    `δ̄ = (δ + x_B·y_B) mod q`, which only B (knowing `x_B`) can compute
//! 4. Signing: draw a nonce `r` invertible mod `p−1`, output `R = g^r mod p`
//!    and `s = r⁻¹·(m − δ·R) mod (p−1)` for the message digest `m`
//! 5. Verification: accept iff `g^m ≡ R^s·v^R (mod p)`, where `v` is rebuilt
//!    from public values alone (`y_A·K^K`, plus `y_B^{y_B}` when protected)
//!
//! Arithmetic is variable-time over arbitrary-precision integers: this crate
//! specifies the algorithmic contract and accepts any valid group, including
//! toy-sized ones. It does not attempt constant-time exponentiation or
//! parameter-strength policy.

pub mod reexports {
    pub use num_bigint;
    pub use rand;
}

use num_bigint::{BigUint, RandBigInt};
use num_integer::Integer;
use num_traits::{One, Zero};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::error::Error;
use std::fmt;
use std::hash::{Hash, Hasher};
use tracing::error;

/// Attempt bound for the delegation loop. The delegation identity is an
/// algebraic tautology under valid parameters, so exhausting this bound
/// indicates a parameter or implementation defect rather than bad luck.
const DELEGATION_RETRY_MAX: usize = 5;

/// Attempt bound for the signing-nonce search. Roughly half of all nonce
/// candidates are even and therefore not invertible mod the even `p−1`, so
/// the bound is generous enough to make exhaustion negligible.
const NONCE_RETRY_MAX: usize = 500;

/// Custom error type for proxy signature operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxySignatureError {
    /// Group parameters failed validation
    InvalidParameters(String),
    /// A supplied private exponent was outside `[1, q−1]`
    KeyOutOfRange,
    /// The delegation identity did not hold within the attempt bound
    DelegationFailed { attempts: usize },
    /// No nonce invertible mod `p−1` was found within the attempt bound
    NoInvertibleNonce { attempts: usize },
}

impl fmt::Display for ProxySignatureError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ProxySignatureError::InvalidParameters(reason) => {
                write!(f, "Invalid group parameters: {}", reason)
            }
            ProxySignatureError::KeyOutOfRange => {
                write!(f, "Private exponent outside [1, q-1]")
            }
            ProxySignatureError::DelegationFailed { attempts } => {
                write!(f, "Delegation identity failed after {} attempts", attempts)
            }
            ProxySignatureError::NoInvertibleNonce { attempts } => {
                write!(f, "No invertible signing nonce after {} attempts", attempts)
            }
        }
    }
}

impl Error for ProxySignatureError {}

/// Result type alias for proxy signature operations
pub type Result<T> = std::result::Result<T, ProxySignatureError>;

/// Compute `base^exponent mod modulus`.
pub fn mod_pow(base: &BigUint, exponent: &BigUint, modulus: &BigUint) -> BigUint {
    base.modpow(exponent, modulus)
}

/// Multiplicative inverse of `a` mod `modulus`, when `gcd(a, modulus) = 1`.
///
/// Returns `None` when no inverse exists. Absence of an inverse is an
/// expected condition during nonce selection, not a fault.
pub fn mod_inverse(a: &BigUint, modulus: &BigUint) -> Option<BigUint> {
    a.modinv(modulus)
}

/// Map a message to an exponent in `[0, q)` via SHA-256 reduced mod `q`.
///
/// Plain reduction carries a small statistical bias toward low exponents
/// whenever `q` does not divide the 2^256 digest space evenly. The scheme
/// is defined with this reduction, so the bias is kept and documented
/// rather than replaced with rejection sampling.
pub fn hash_to_exponent(message: &[u8], q: &BigUint) -> BigUint {
    let digest = Sha256::digest(message);
    BigUint::from_bytes_be(&digest) % q
}

/// The algebraic setting shared by every protocol step.
///
/// Holds a prime modulus `p`, the order `q` of the signing subgroup
/// (a prime divisor of `p−1`), and a generator `g` of that subgroup.
/// Immutable once constructed; all other types borrow it read-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupParameters {
    /// Prime modulus of the ambient multiplicative group
    pub p: BigUint,
    /// Order of the generator; a prime divisor of `p−1`
    pub q: BigUint,
    /// Element of multiplicative order exactly `q` mod `p`
    pub g: BigUint,
}

impl GroupParameters {
    /// Construct and validate group parameters.
    ///
    /// # Errors
    /// Returns `InvalidParameters` when `q` does not divide `p−1`, when `g`
    /// lies outside `(1, p)`, or when `g^q mod p ≠ 1`. With `q` prime these
    /// checks pin the order of `g` to exactly `q`.
    pub fn new(p: BigUint, q: BigUint, g: BigUint) -> Result<Self> {
        let params = GroupParameters { p, q, g };
        params.validate()?;
        Ok(params)
    }

    /// Re-run the construction-time checks.
    ///
    /// Useful when parameters were built from raw fields or deserialized,
    /// bypassing [`GroupParameters::new`].
    pub fn validate(&self) -> Result<()> {
        if self.p <= BigUint::from(3u32) {
            return Err(ProxySignatureError::InvalidParameters(
                "modulus must exceed 3".into(),
            ));
        }
        if self.q <= BigUint::one() {
            return Err(ProxySignatureError::InvalidParameters(
                "subgroup order must exceed 1".into(),
            ));
        }
        if !(&self.p - 1u32).is_multiple_of(&self.q) {
            return Err(ProxySignatureError::InvalidParameters(
                "subgroup order does not divide p-1".into(),
            ));
        }
        if self.g <= BigUint::one() || self.g >= self.p {
            return Err(ProxySignatureError::InvalidParameters(
                "generator outside (1, p)".into(),
            ));
        }
        if mod_pow(&self.g, &self.q, &self.p) != BigUint::one() {
            return Err(ProxySignatureError::InvalidParameters(
                "generator does not have order q".into(),
            ));
        }
        Ok(())
    }

    /// Modulus for signature-exponent arithmetic, `p − 1`.
    pub fn exponent_modulus(&self) -> BigUint {
        &self.p - 1u32
    }
}

impl fmt::Display for GroupParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "GroupParameters(p: {}, q: {}, g: {})",
            self.p, self.q, self.g
        )
    }
}

/// A principal's key pair: private exponent `x ∈ [1, q−1]` and public
/// value `y = g^x mod p`.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyPair {
    /// Private exponent; never transmitted
    pub x: BigUint,
    /// Public value `g^x mod p`
    pub y: BigUint,
}

impl KeyPair {
    /// Generate a key pair with `x` drawn uniformly from `[1, q−1]`.
    ///
    /// # Errors
    /// Returns `InvalidParameters` when the group fails validation.
    pub fn generate<R: RngCore + CryptoRng>(
        params: &GroupParameters,
        rng: &mut R,
    ) -> Result<Self> {
        params.validate()?;
        let x = rng.gen_biguint_range(&BigUint::one(), &params.q);
        let y = mod_pow(&params.g, &x, &params.p);
        Ok(KeyPair { x, y })
    }

    /// Build a key pair from an existing private exponent.
    ///
    /// # Errors
    /// Returns `KeyOutOfRange` when `x ∉ [1, q−1]`, and `InvalidParameters`
    /// when the group fails validation.
    pub fn from_private_exponent(params: &GroupParameters, x: BigUint) -> Result<Self> {
        params.validate()?;
        if x.is_zero() || x >= params.q {
            return Err(ProxySignatureError::KeyOutOfRange);
        }
        let y = mod_pow(&params.g, &x, &params.p);
        Ok(KeyPair { x, y })
    }

    /// Get a reference to the public value
    pub fn public_value(&self) -> &BigUint {
        &self.y
    }

    /// Get a reference to the private exponent
    pub fn private_exponent(&self) -> &BigUint {
        &self.x
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("x", &"<redacted>")
            .field("y", &self.y)
            .finish()
    }
}

impl fmt::Display for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyPair(y: {})", self.y)
    }
}

impl AsRef<BigUint> for KeyPair {
    fn as_ref(&self) -> &BigUint {
        &self.y
    }
}

impl From<&KeyPair> for BigUint {
    fn from(keypair: &KeyPair) -> Self {
        keypair.y.clone()
    }
}

impl Hash for KeyPair {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Only hash the public value, not the private exponent
        self.y.hash(state);
    }
}

/// One delegation round with a fixed `k`.
///
/// Returns `(δ, K)` when the delegation identity `g^δ ≡ y_A·K^K (mod p)`
/// holds for this `k`, `None` otherwise.
fn delegation_round(
    params: &GroupParameters,
    delegator: &KeyPair,
    k: &BigUint,
) -> Option<(BigUint, BigUint)> {
    let commitment = mod_pow(&params.g, k, &params.p);
    let delta = (&delegator.x + k * &commitment) % &params.q;
    let lhs = mod_pow(&params.g, &delta, &params.p);
    let rhs = (&delegator.y * mod_pow(&commitment, &commitment, &params.p)) % &params.p;
    if lhs == rhs {
        Some((delta, commitment))
    } else {
        None
    }
}

/// Delegation credential for the unprotected variant.
///
/// Any party holding `δ` and `K` — the delegator included — can produce
/// valid proxy signatures under it. That mutual non-repudiation risk is the
/// defining property of this variant.
#[derive(Clone, PartialEq, Eq)]
pub struct UnprotectedDelegation {
    /// Signing exponent `δ = (x_A + k·K) mod q`
    delta: BigUint,
    /// Public commitment `K = g^k mod p`
    commitment: BigUint,
}

impl UnprotectedDelegation {
    /// Run the delegation handshake for delegator A.
    ///
    /// Each attempt draws `k` uniformly from `[2, q−1]` and keeps the result
    /// only when the delegation identity holds.
    ///
    /// # Errors
    /// Returns `DelegationFailed` when no attempt satisfies the identity
    /// within the bound. Under valid parameters the identity holds by
    /// construction, so this error signals a defective group, not bad
    /// randomness.
    pub fn delegate<R: RngCore + CryptoRng>(
        params: &GroupParameters,
        delegator: &KeyPair,
        rng: &mut R,
    ) -> Result<Self> {
        for _ in 0..DELEGATION_RETRY_MAX {
            let k = rng.gen_biguint_range(&BigUint::from(2u32), &params.q);
            if let Some((delta, commitment)) = delegation_round(params, delegator, &k) {
                return Ok(UnprotectedDelegation { delta, commitment });
            }
        }
        error!(
            attempts = DELEGATION_RETRY_MAX,
            "delegation identity never held; group parameters are suspect"
        );
        Err(ProxySignatureError::DelegationFailed {
            attempts: DELEGATION_RETRY_MAX,
        })
    }

    /// Check the public delegation identity `g^δ ≡ y_A·K^K (mod p)`.
    ///
    /// A credential failing this check must never be used for signing.
    pub fn verify(&self, params: &GroupParameters, delegator_public: &BigUint) -> bool {
        let lhs = mod_pow(&params.g, &self.delta, &params.p);
        let rhs = (delegator_public * mod_pow(&self.commitment, &self.commitment, &params.p))
            % &params.p;
        lhs == rhs
    }

    /// Sign a message under this credential.
    pub fn sign<R: RngCore + CryptoRng>(
        &self,
        params: &GroupParameters,
        message: &[u8],
        rng: &mut R,
    ) -> Result<ProxySignature> {
        proxy_sign(params, &self.delta, &self.commitment, message, rng)
    }

    /// Get a reference to the signing exponent `δ`
    pub fn signing_exponent(&self) -> &BigUint {
        &self.delta
    }

    /// Get a reference to the commitment `K`
    pub fn commitment(&self) -> &BigUint {
        &self.commitment
    }
}

impl fmt::Debug for UnprotectedDelegation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnprotectedDelegation")
            .field("delta", &"<redacted>")
            .field("commitment", &self.commitment)
            .finish()
    }
}

impl fmt::Display for UnprotectedDelegation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UnprotectedDelegation(K: {})", self.commitment)
    }
}

/// Delegation credential for the protected variant.
///
/// Extends the unprotected handshake with `δ̄ = (δ + x_B·y_B) mod q`.
/// Only the proxy, who alone knows `x_B`, can compute `δ̄`; this removes
/// the delegator's ability to forge proxy signatures.
#[derive(Clone, PartialEq, Eq)]
pub struct ProtectedDelegation {
    /// Base exponent `δ` from the delegator's handshake
    delta: BigUint,
    /// Proxy exponent `δ̄ = (δ + x_B·y_B) mod q`
    delta_bar: BigUint,
    /// Public commitment `K = g^k mod p`
    commitment: BigUint,
}

impl ProtectedDelegation {
    /// Run the delegation handshake for delegator A and proxy B.
    ///
    /// # Errors
    /// Returns `DelegationFailed` as in [`UnprotectedDelegation::delegate`].
    pub fn delegate<R: RngCore + CryptoRng>(
        params: &GroupParameters,
        delegator: &KeyPair,
        proxy: &KeyPair,
        rng: &mut R,
    ) -> Result<Self> {
        for _ in 0..DELEGATION_RETRY_MAX {
            let k = rng.gen_biguint_range(&BigUint::from(2u32), &params.q);
            if let Some((delta, commitment)) = delegation_round(params, delegator, &k) {
                let delta_bar = (&delta + &proxy.x * &proxy.y) % &params.q;
                return Ok(ProtectedDelegation {
                    delta,
                    delta_bar,
                    commitment,
                });
            }
        }
        error!(
            attempts = DELEGATION_RETRY_MAX,
            "delegation identity never held; group parameters are suspect"
        );
        Err(ProxySignatureError::DelegationFailed {
            attempts: DELEGATION_RETRY_MAX,
        })
    }

    /// Check the public delegation identity `g^δ ≡ y_A·K^K (mod p)`.
    pub fn verify(&self, params: &GroupParameters, delegator_public: &BigUint) -> bool {
        let lhs = mod_pow(&params.g, &self.delta, &params.p);
        let rhs = (delegator_public * mod_pow(&self.commitment, &self.commitment, &params.p))
            % &params.p;
        lhs == rhs
    }

    /// Sign a message under the proxy exponent `δ̄`.
    pub fn sign<R: RngCore + CryptoRng>(
        &self,
        params: &GroupParameters,
        message: &[u8],
        rng: &mut R,
    ) -> Result<ProxySignature> {
        proxy_sign(params, &self.delta_bar, &self.commitment, message, rng)
    }

    /// Get a reference to the base exponent `δ`
    pub fn base_exponent(&self) -> &BigUint {
        &self.delta
    }

    /// Get a reference to the proxy exponent `δ̄`
    pub fn proxy_exponent(&self) -> &BigUint {
        &self.delta_bar
    }

    /// Get a reference to the commitment `K`
    pub fn commitment(&self) -> &BigUint {
        &self.commitment
    }
}

impl fmt::Debug for ProtectedDelegation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtectedDelegation")
            .field("delta", &"<redacted>")
            .field("delta_bar", &"<redacted>")
            .field("commitment", &self.commitment)
            .finish()
    }
}

impl fmt::Display for ProtectedDelegation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProtectedDelegation(K: {})", self.commitment)
    }
}

/// One signing round with a fixed nonce.
///
/// Returns the signature when the nonce is invertible mod `p−1`, `None`
/// otherwise. `m − δ·R` is computed by adding the modulus first, keeping
/// the whole calculation in unsigned integers.
fn signature_round(
    params: &GroupParameters,
    signing_exponent: &BigUint,
    commitment: &BigUint,
    digest: &BigUint,
    nonce: &BigUint,
) -> Option<ProxySignature> {
    let exp_mod = params.exponent_modulus();
    let nonce_inv = mod_inverse(nonce, &exp_mod)?;
    let r = mod_pow(&params.g, nonce, &params.p);
    let reduced = (signing_exponent * &r) % &exp_mod;
    let numerator = (digest + (&exp_mod - &reduced)) % &exp_mod;
    let s = (&nonce_inv * numerator) % &exp_mod;
    Some(ProxySignature {
        r,
        s,
        commitment: commitment.clone(),
        digest: digest.clone(),
        signing_exponent: signing_exponent.clone(),
    })
}

/// Create a proxy signature for a message.
///
/// # Arguments
/// * `signing_exponent` - `δ` (unprotected) or `δ̄` (protected)
/// * `commitment` - the delegation commitment `K`
/// * `message` - message bytes to sign (UTF-8 strings via `as_bytes`)
/// * `rng` - random source for nonce generation
///
/// # Errors
/// Returns `NoInvertibleNonce` when no nonce invertible mod `p−1` is found
/// within the attempt bound.
pub fn proxy_sign<R: RngCore + CryptoRng>(
    params: &GroupParameters,
    signing_exponent: &BigUint,
    commitment: &BigUint,
    message: &[u8],
    rng: &mut R,
) -> Result<ProxySignature> {
    let digest = hash_to_exponent(message, &params.q);
    for _ in 0..NONCE_RETRY_MAX {
        let nonce = rng.gen_biguint_range(&BigUint::from(2u32), &params.q);
        if let Some(sig) = signature_round(params, signing_exponent, commitment, &digest, &nonce) {
            return Ok(sig);
        }
    }
    error!(
        attempts = NONCE_RETRY_MAX,
        "no invertible nonce found; group parameters are suspect"
    );
    Err(ProxySignatureError::NoInvertibleNonce {
        attempts: NONCE_RETRY_MAX,
    })
}

/// A proxy signature `(R, s, K)` over a message.
///
/// `digest` and `signing_exponent` record what the signer actually used,
/// for diagnostics; verification relies on the public triple alone.
#[derive(Clone, PartialEq, Eq)]
pub struct ProxySignature {
    /// Nonce commitment `R = g^r mod p`
    pub r: BigUint,
    /// Response `s = r⁻¹·(m − δ·R) mod (p−1)`
    pub s: BigUint,
    /// Delegation commitment `K` the signature was produced under
    pub commitment: BigUint,
    /// Message digest `m` reduced into `[0, q)`
    pub digest: BigUint,
    /// Signing exponent actually used; diagnostic, treat as secret
    pub signing_exponent: BigUint,
}

impl ProxySignature {
    /// Verify against the delegator's public key alone (unprotected
    /// variant), with `v = y_A·K^K mod p`.
    ///
    /// An invalid signature is a normal outcome, never an error.
    pub fn verify_unprotected(
        &self,
        params: &GroupParameters,
        message: &[u8],
        delegator_public: &BigUint,
    ) -> VerificationOutcome {
        let v = (delegator_public * mod_pow(&self.commitment, &self.commitment, &params.p))
            % &params.p;
        self.check(params, message, v)
    }

    /// Verify against both public keys (protected variant), with
    /// `v = y_A·K^K·y_B^{y_B} mod p`.
    pub fn verify_protected(
        &self,
        params: &GroupParameters,
        message: &[u8],
        delegator_public: &BigUint,
        proxy_public: &BigUint,
    ) -> VerificationOutcome {
        let v = (delegator_public * mod_pow(&self.commitment, &self.commitment, &params.p))
            % &params.p;
        let v = (v * mod_pow(proxy_public, proxy_public, &params.p)) % &params.p;
        self.check(params, message, v)
    }

    /// Evaluate `g^m ≡ R^s·v^R (mod p)` for a reconstructed `v`.
    fn check(&self, params: &GroupParameters, message: &[u8], v: BigUint) -> VerificationOutcome {
        let m = hash_to_exponent(message, &params.q);
        let lhs = mod_pow(&params.g, &m, &params.p);
        let rhs =
            (mod_pow(&self.r, &self.s, &params.p) * mod_pow(&v, &self.r, &params.p)) % &params.p;
        VerificationOutcome {
            valid: lhs == rhs,
            lhs,
            rhs,
            v,
        }
    }
}

impl fmt::Debug for ProxySignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxySignature")
            .field("r", &self.r)
            .field("s", &self.s)
            .field("commitment", &self.commitment)
            .field("digest", &self.digest)
            .field("signing_exponent", &"<redacted>")
            .finish()
    }
}

impl fmt::Display for ProxySignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ProxySignature(R: {}, s: {}, K: {})",
            self.r, self.s, self.commitment
        )
    }
}

impl Hash for ProxySignature {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.r.hash(state);
        self.s.hash(state);
        self.commitment.hash(state);
    }
}

/// Result of a verification, with the recomputed sides of the equation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationOutcome {
    /// Whether the verification equation held
    pub valid: bool,
    /// Left side `g^m mod p`
    pub lhs: BigUint,
    /// Right side `R^s·v^R mod p`
    pub rhs: BigUint,
    /// Reconstructed verification value `v`
    pub v: BigUint,
}

impl fmt::Display for VerificationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.valid {
            write!(f, "valid (g^m = {} = R^s·v^R)", self.lhs)
        } else {
            write!(f, "invalid (g^m = {}, R^s·v^R = {})", self.lhs, self.rhs)
        }
    }
}
