//! Error types for the kumiko core library.
//!
//! Dead ends are not errors: the selection policy reports them as `None` and
//! the driver backtracks. The variants below cover configuration faults and
//! broken policy contracts, which abort the aggregation immediately.

use std::{fmt, sync::Arc};

use thiserror::Error;

use crate::{connector::ConnectorType, template::TemplateId};

macro_rules! define_error_codes {
    (
        $(#[$enum_meta:meta])*
        enum $CodeTy:ident for $ErrTy:ident {
            $(
                $(#[$variant_meta:meta])*
                $CodeVariant:ident => $ErrVariant:ident $( { $($pattern:tt)* } )? => $code:expr
            ),+ $(,)?
        }
    ) => {
        $(#[$enum_meta])*
        #[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
        #[non_exhaustive]
        pub enum $CodeTy {
            $(
                $(#[$variant_meta])*
                $CodeVariant,
            )+
        }

        impl $CodeTy {
            /// Return the stable machine-readable representation of this error code.
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$CodeVariant => $code,)+
                }
            }
        }

        impl fmt::Display for $CodeTy {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl $ErrTy {
            #[doc = concat!(
                "Retrieve the stable [`",
                stringify!($CodeTy),
                "`] for this error."
            )]
            pub const fn code(&self) -> $CodeTy {
                match self {
                    $(Self::$ErrVariant $( { $($pattern)* } )? => $CodeTy::$CodeVariant,)+
                }
            }
        }
    };
}

/// Error type produced while building a [`crate::Lexicon`] or running an
/// aggregation.
#[non_exhaustive]
#[derive(Clone, Debug, Error, PartialEq)]
pub enum AggregateError {
    /// A pole pair or template referenced a connector type that was never
    /// declared in the lexicon builder.
    #[error("connector type {connector_type} has not been declared")]
    UndeclaredConnectorType {
        /// The offending connector type identifier.
        connector_type: ConnectorType,
    },
    /// A template identifier did not resolve against the lexicon.
    #[error("template {template} is not registered in the lexicon")]
    UnknownTemplate {
        /// The unresolved template identifier.
        template: TemplateId,
    },
    /// A selection weight was negative, NaN, or infinite.
    #[error("template `{label}` has invalid weight {weight}")]
    InvalidWeight {
        /// Label of the template carrying the weight.
        label: Arc<str>,
        /// The rejected weight.
        weight: f64,
    },
    /// Aggregation parameters failed validation.
    #[error("invalid aggregation parameter: {reason}")]
    InvalidParameters {
        /// Human-readable description of the violated constraint.
        reason: String,
    },
    /// `pop_frame` was called with no frame left to restore.
    #[error("pop_frame called without a matching push_frame")]
    FrameUnderflow,
    /// The policy returned a selection the driver cannot commit.
    #[error("policy selection cannot be committed: {reason}")]
    InvalidSelection {
        /// Description of the broken contract.
        reason: String,
    },
}

define_error_codes! {
    /// Stable codes describing [`AggregateError`] variants.
    enum AggregateErrorCode for AggregateError {
        /// A connector type was used before being declared.
        UndeclaredConnectorType => UndeclaredConnectorType { .. } => "KUMIKO_UNDECLARED_CONNECTOR_TYPE",
        /// A template identifier did not resolve.
        UnknownTemplate => UnknownTemplate { .. } => "KUMIKO_UNKNOWN_TEMPLATE",
        /// A selection weight was rejected.
        InvalidWeight => InvalidWeight { .. } => "KUMIKO_INVALID_WEIGHT",
        /// Aggregation parameters failed validation.
        InvalidParameters => InvalidParameters { .. } => "KUMIKO_INVALID_PARAMETERS",
        /// The frame stack was popped past its bottom.
        FrameUnderflow => FrameUnderflow => "KUMIKO_FRAME_UNDERFLOW",
        /// The policy broke the selection contract.
        InvalidSelection => InvalidSelection { .. } => "KUMIKO_INVALID_SELECTION",
    }
}

impl AggregateError {
    /// Returns `true` when the error stems from lexicon or parameter
    /// configuration rather than from a misbehaving policy.
    #[must_use]
    pub const fn is_configuration_fault(&self) -> bool {
        matches!(
            self,
            Self::UndeclaredConnectorType { .. }
                | Self::UnknownTemplate { .. }
                | Self::InvalidWeight { .. }
                | Self::InvalidParameters { .. }
        )
    }
}

/// Convenient alias for results returned by the core API.
pub type Result<T> = core::result::Result<T, AggregateError>;
