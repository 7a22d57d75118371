//! brainpoolP256r1 key pairs, ECDH and the PACE generic mapping
//!
//! Point and scalar arithmetic is delegated to the constant time
//! `ProjectivePoint` and `Scalar` of the `bp256` crate. This module only adds
//! the uncompressed wire encoding and the PACE specific operations.

use std::fmt;

use bp256::r1::BrainpoolP256r1;
use elliptic_curve::group::Group;
use elliptic_curve::ops::Reduce;
use elliptic_curve::sec1::{FromSec1Point, ToSec1Point};
use elliptic_curve::{AffinePoint, FieldBytes, Generate, ProjectivePoint, Scalar, SecretKey};
use zeroize::Zeroizing;

/// Length of one field element or scalar
pub const COORDINATE_LEN: usize = 32;
/// Length of an uncompressed point `04 || X || Y`
pub const UNCOMPRESSED_POINT_LEN: usize = 1 + 2 * COORDINATE_LEN;

const UNCOMPRESSED_PREFIX: u8 = 0x04;

type Curve = BrainpoolP256r1;

/// Elliptic curve failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EcError {
    /// Encoding is not `04 || X || Y` with 32 byte coordinates
    #[error("Invalid point encoding")]
    InvalidPointEncoding,

    /// Decoded point does not satisfy the curve equation
    #[error("Point is not on the curve")]
    PointNotOnCurve,

    /// A computation ended in the point at infinity
    #[error("Arithmetic result is the point at infinity")]
    ArithmeticResultInfinite,

    /// Scalar is zero or not below the group order
    #[error("Invalid scalar")]
    InvalidScalar,
}

/// Affine point on brainpoolP256r1, never the point at infinity
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct EcPoint(AffinePoint<Curve>);

impl EcPoint {
    /// Base point `G` of the curve
    pub fn generator() -> Self {
        Self(ProjectivePoint::<Curve>::generator().to_affine())
    }

    /// Decode and validate an uncompressed point
    pub fn from_uncompressed(bytes: &[u8]) -> Result<Self, EcError> {
        if bytes.len() != UNCOMPRESSED_POINT_LEN || bytes[0] != UNCOMPRESSED_PREFIX {
            return Err(EcError::InvalidPointEncoding);
        }
        let encoded = elliptic_curve::sec1::EncodedPoint::<Curve>::from_bytes(bytes)
            .map_err(|_| EcError::InvalidPointEncoding)?;
        Option::from(AffinePoint::<Curve>::from_encoded_point(&encoded))
            .map(Self)
            .ok_or(EcError::PointNotOnCurve)
    }

    /// Uncompressed encoding with left padded coordinates
    pub fn to_uncompressed(&self) -> [u8; UNCOMPRESSED_POINT_LEN] {
        let encoded = self.0.to_encoded_point(false);
        let mut out = [0u8; UNCOMPRESSED_POINT_LEN];
        out.copy_from_slice(encoded.as_bytes());
        out
    }

    /// Left padded X coordinate, the ECDH shared secret
    pub fn x_bytes(&self) -> Zeroizing<[u8; COORDINATE_LEN]> {
        let mut x = Zeroizing::new([0u8; COORDINATE_LEN]);
        x.copy_from_slice(&self.to_uncompressed()[1..=COORDINATE_LEN]);
        x
    }

    fn from_projective(point: ProjectivePoint<Curve>) -> Result<Self, EcError> {
        if bool::from(point.is_identity()) {
            return Err(EcError::ArithmeticResultInfinite);
        }
        Ok(Self(point.to_affine()))
    }

    fn projective(&self) -> ProjectivePoint<Curve> {
        ProjectivePoint::<Curve>::from(self.0)
    }
}

impl fmt::Debug for EcPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EcPoint({})", hex::encode_upper(self.to_uncompressed()))
    }
}

/// Ephemeral key pair over an arbitrary generator
pub struct KeyPair {
    secret: SecretKey<Curve>,
    public: EcPoint,
}

impl KeyPair {
    /// Random private scalar in `[1, n-1]` and its public point over `generator`
    pub fn generate(generator: &EcPoint) -> Result<Self, EcError> {
        Self::with_secret(SecretKey::generate(), generator)
    }

    /// Key pair for a given big-endian private scalar
    pub fn from_secret(secret: &[u8], generator: &EcPoint) -> Result<Self, EcError> {
        let padded = left_pad(secret).ok_or(EcError::InvalidScalar)?;
        let secret = SecretKey::<Curve>::from_bytes(FieldBytes::<Curve>::from_slice(&*padded))
            .map_err(|_| EcError::InvalidScalar)?;
        Self::with_secret(secret, generator)
    }

    fn with_secret(secret: SecretKey<Curve>, generator: &EcPoint) -> Result<Self, EcError> {
        let scalar = *secret.to_nonzero_scalar();
        let public = EcPoint::from_projective(generator.projective() * scalar)?;
        Ok(Self { secret, public })
    }

    /// Public point
    pub const fn public_key(&self) -> &EcPoint {
        &self.public
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("secret", &"<redacted>")
            .field("public", &self.public)
            .finish()
    }
}

fn left_pad(bytes: &[u8]) -> Option<Zeroizing<[u8; COORDINATE_LEN]>> {
    let start = COORDINATE_LEN.checked_sub(bytes.len())?;
    let mut out = Zeroizing::new([0u8; COORDINATE_LEN]);
    out[start..].copy_from_slice(bytes);
    Some(out)
}

/// ECDH: `private * peer`
pub fn shared_secret(key_pair: &KeyPair, peer: &EcPoint) -> Result<EcPoint, EcError> {
    EcPoint::from_projective(peer.projective() * *key_pair.secret.to_nonzero_scalar())
}

/// Generator produced by the PACE generic mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedGenerator(EcPoint);

impl MappedGenerator {
    /// Mapped base point
    pub const fn point(&self) -> &EcPoint {
        &self.0
    }
}

/// Generic mapping: `G~ = (s mod n) * G + privateKey1 * peerPublic1`
///
/// Returns the mapped generator and a fresh key pair over it. A result at
/// infinity is a hard failure, a new nonce would be needed to continue.
pub fn map_nonce(
    nonce: &[u8],
    peer_public: &EcPoint,
    key_pair: &KeyPair,
) -> Result<(MappedGenerator, KeyPair), EcError> {
    let h = shared_secret(key_pair, peer_public)?;
    let padded = left_pad(nonce).ok_or(EcError::InvalidScalar)?;
    let s = <Scalar<Curve> as Reduce<FieldBytes<Curve>>>::reduce(FieldBytes::<Curve>::from_slice(
        &*padded,
    ));

    let g_tilde =
        EcPoint::from_projective(ProjectivePoint::<Curve>::generator() * s + h.projective())?;

    let mapped = MappedGenerator(g_tilde);
    let key_pair = KeyPair::generate(mapped.point())?;
    Ok((mapped, key_pair))
}
