//! The checkout steps as a value.
//!
//! ```text
//! Address --advance--> Payment --advance--> Summary
//!    ^                    |  ^                 |
//!    +------- back -------+  +----- back ------+
//! ```
//!
//! Each state carries exactly what the next step needs, so `Summary` cannot
//! exist without a chosen address and payment method.

use quickcommerce_core::{Address, AddressId, PaymentMethod};
use thiserror::Error;

/// Checkout step, without payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutStep {
    Address,
    Payment,
    Summary,
}

impl CheckoutStep {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Address => "Shipping address",
            Self::Payment => "Payment",
            Self::Summary => "Review order",
        }
    }
}

/// Invalid checkout transitions.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Please select a shipping address")]
    NoAddressSelected,

    #[error("Address {0} is no longer available")]
    UnknownAddress(AddressId),

    #[error("Please select a payment method")]
    NoPaymentSelected,

    #[error("Not available on the {} step", .0.label())]
    WrongStep(CheckoutStep),

    #[error("Already at the first step")]
    AtFirstStep,
}

/// Current step and the selections made so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutState {
    Address {
        selected: Option<AddressId>,
    },
    Payment {
        address: Address,
        selected: Option<PaymentMethod>,
    },
    Summary {
        address: Address,
        payment: PaymentMethod,
    },
}

impl Default for CheckoutState {
    fn default() -> Self {
        Self::Address { selected: None }
    }
}

impl CheckoutState {
    #[must_use]
    pub const fn step(&self) -> CheckoutStep {
        match self {
            Self::Address { .. } => CheckoutStep::Address,
            Self::Payment { .. } => CheckoutStep::Payment,
            Self::Summary { .. } => CheckoutStep::Summary,
        }
    }

    /// The chosen shipping address, once past the address step.
    #[must_use]
    pub const fn address(&self) -> Option<&Address> {
        match self {
            Self::Address { .. } => None,
            Self::Payment { address, .. } | Self::Summary { address, .. } => Some(address),
        }
    }

    /// The chosen payment method, if any.
    #[must_use]
    pub const fn payment(&self) -> Option<&PaymentMethod> {
        match self {
            Self::Address { .. } => None,
            Self::Payment { selected, .. } => selected.as_ref(),
            Self::Summary { payment, .. } => Some(payment),
        }
    }

    /// Address currently highlighted on the address step.
    #[must_use]
    pub const fn selected_address_id(&self) -> Option<AddressId> {
        match self {
            Self::Address { selected } => *selected,
            Self::Payment { address, .. } | Self::Summary { address, .. } => Some(address.id),
        }
    }

    /// Highlight an address.
    ///
    /// # Errors
    ///
    /// [`TransitionError::WrongStep`] outside the address step.
    pub fn select_address(&mut self, id: AddressId) -> Result<(), TransitionError> {
        match self {
            Self::Address { selected } => {
                *selected = Some(id);
                Ok(())
            }
            other => Err(TransitionError::WrongStep(other.step())),
        }
    }

    /// Address → Payment with the highlighted address.
    ///
    /// # Errors
    ///
    /// Fails when nothing is highlighted or the highlighted address is not in
    /// `addresses`.
    pub fn advance_to_payment(&mut self, addresses: &[Address]) -> Result<(), TransitionError> {
        let Self::Address { selected } = self else {
            return Err(TransitionError::WrongStep(self.step()));
        };
        let id = selected.ok_or(TransitionError::NoAddressSelected)?;
        let address = addresses
            .iter()
            .find(|address| address.id == id)
            .cloned()
            .ok_or(TransitionError::UnknownAddress(id))?;

        *self = Self::Payment {
            address,
            selected: None,
        };
        Ok(())
    }

    /// Choose a payment method.
    ///
    /// # Errors
    ///
    /// [`TransitionError::WrongStep`] outside the payment step.
    pub fn select_payment(&mut self, method: PaymentMethod) -> Result<(), TransitionError> {
        match self {
            Self::Payment { selected, .. } => {
                *selected = Some(method);
                Ok(())
            }
            other => Err(TransitionError::WrongStep(other.step())),
        }
    }

    /// Payment → Summary.
    ///
    /// # Errors
    ///
    /// [`TransitionError::NoPaymentSelected`] if no method was chosen.
    pub fn advance_to_summary(&mut self) -> Result<(), TransitionError> {
        let Self::Payment { address, selected } = self else {
            return Err(TransitionError::WrongStep(self.step()));
        };
        let payment = selected.clone().ok_or(TransitionError::NoPaymentSelected)?;

        *self = Self::Summary {
            address: address.clone(),
            payment,
        };
        Ok(())
    }

    /// One step back, keeping the selection of the step returned to.
    ///
    /// # Errors
    ///
    /// [`TransitionError::AtFirstStep`] on the address step.
    pub fn back(&mut self) -> Result<(), TransitionError> {
        *self = match self {
            Self::Address { .. } => return Err(TransitionError::AtFirstStep),
            Self::Payment { address, .. } => Self::Address {
                selected: Some(address.id),
            },
            Self::Summary { address, payment } => Self::Payment {
                address: address.clone(),
                selected: Some(payment.clone()),
            },
        };
        Ok(())
    }
}
