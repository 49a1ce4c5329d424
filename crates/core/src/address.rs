//! Shipping addresses and the address form.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::types::AddressId;

/// Address fields as exchanged with the backend (no id).
///
/// This is the body of `POST /api/addresses` and the `shippingAddress` of an
/// order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressDetails {
    pub full_name: String,
    pub street: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apartment: Option<String>,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_info: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

impl AddressDetails {
    /// Single-line rendering for selection lists and the order summary.
    #[must_use]
    pub fn one_line(&self) -> String {
        let mut line = self.street.clone();
        if let Some(apartment) = &self.apartment {
            line.push_str(", ");
            line.push_str(apartment);
        }
        format!(
            "{line}, {}, {} {}, {}",
            self.city, self.state, self.zip_code, self.country
        )
    }
}

/// A saved address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub id: AddressId,
    #[serde(flatten)]
    pub details: AddressDetails,
}

impl Address {
    #[must_use]
    pub const fn is_default(&self) -> bool {
        self.details.is_default
    }
}

/// The address that should start out selected: the default one, else the first.
#[must_use]
pub fn preselect(addresses: &[Address]) -> Option<AddressId> {
    addresses
        .iter()
        .find(|address| address.is_default())
        .or_else(|| addresses.first())
        .map(|address| address.id)
}

/// `GET /api/addresses` body. Both shapes are in use.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AddressList {
    Bare(Vec<Address>),
    Wrapped { addresses: Vec<Address> },
}

impl AddressList {
    #[must_use]
    pub fn into_vec(self) -> Vec<Address> {
        match self {
            Self::Bare(addresses) | Self::Wrapped { addresses } => addresses,
        }
    }
}

/// A required field of the address form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AddressField {
    FullName,
    Street,
    City,
    State,
    ZipCode,
    Country,
    Phone,
}

impl AddressField {
    /// All required fields, in form order.
    pub const REQUIRED: [Self; 7] = [
        Self::FullName,
        Self::Street,
        Self::City,
        Self::State,
        Self::ZipCode,
        Self::Country,
        Self::Phone,
    ];

    /// Inline label shown when the field is left blank.
    #[must_use]
    pub const fn required_message(self) -> &'static str {
        match self {
            Self::FullName => "Full name is required",
            Self::Street => "Street is required",
            Self::City => "City is required",
            Self::State => "State is required",
            Self::ZipCode => "ZIP code is required",
            Self::Country => "Country is required",
            Self::Phone => "Phone number is required",
        }
    }
}

/// Per-field validation failures of an [`AddressForm`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressErrors {
    missing: Vec<AddressField>,
}

impl AddressErrors {
    /// Fields that failed, in form order.
    #[must_use]
    pub fn fields(&self) -> &[AddressField] {
        &self.missing
    }

    /// Message for one field, if it failed.
    #[must_use]
    pub fn message_for(&self, field: AddressField) -> Option<&'static str> {
        self.missing
            .contains(&field)
            .then(|| field.required_message())
    }

    /// `(field, message)` pairs, in form order.
    pub fn iter(&self) -> impl Iterator<Item = (AddressField, &'static str)> + '_ {
        self.missing
            .iter()
            .map(|field| (*field, field.required_message()))
    }
}

impl fmt::Display for AddressErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<&str> = self.iter().map(|(_, message)| message).collect();
        f.write_str(&messages.join("; "))
    }
}

impl std::error::Error for AddressErrors {}

/// Raw address form input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressForm {
    pub full_name: String,
    pub street: String,
    pub apartment: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
    pub phone: String,
    pub additional_info: String,
    pub is_default: bool,
}

impl AddressForm {
    const fn value(&self, field: AddressField) -> &String {
        match field {
            AddressField::FullName => &self.full_name,
            AddressField::Street => &self.street,
            AddressField::City => &self.city,
            AddressField::State => &self.state,
            AddressField::ZipCode => &self.zip_code,
            AddressField::Country => &self.country,
            AddressField::Phone => &self.phone,
        }
    }

    /// Check required fields and produce the trimmed request body.
    ///
    /// # Errors
    ///
    /// Returns every empty or whitespace-only required field.
    pub fn validate(&self) -> Result<AddressDetails, AddressErrors> {
        let missing: Vec<AddressField> = AddressField::REQUIRED
            .into_iter()
            .filter(|field| self.value(*field).trim().is_empty())
            .collect();
        if !missing.is_empty() {
            return Err(AddressErrors { missing });
        }

        let optional = |value: &str| {
            let value = value.trim();
            (!value.is_empty()).then(|| value.to_owned())
        };

        Ok(AddressDetails {
            full_name: self.full_name.trim().to_owned(),
            street: self.street.trim().to_owned(),
            apartment: optional(&self.apartment),
            city: self.city.trim().to_owned(),
            state: self.state.trim().to_owned(),
            zip_code: self.zip_code.trim().to_owned(),
            country: self.country.trim().to_owned(),
            phone: self.phone.trim().to_owned(),
            additional_info: optional(&self.additional_info),
            is_default: self.is_default,
        })
    }
}
