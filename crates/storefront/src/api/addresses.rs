//! Address book endpoints.

use quickcommerce_core::{Address, AddressDetails, AddressId, AddressList};
use reqwest::Method;
use tracing::instrument;

use super::{ApiClient, ApiError};

impl ApiClient {
    /// `GET /api/addresses`. Accepts a bare array or `{ "addresses": [...] }`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body is neither shape.
    #[instrument(skip(self))]
    pub async fn list_addresses(&self) -> Result<Vec<Address>, ApiError> {
        let url = self.endpoint("api/addresses")?;
        let list: Option<AddressList> = self.fetch_optional(self.request(Method::GET, url)).await?;
        Ok(list.map(AddressList::into_vec).unwrap_or_default())
    }

    /// `POST /api/addresses`. Returns the saved address when the backend
    /// echoes it.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, address))]
    pub async fn create_address(
        &self,
        address: &AddressDetails,
    ) -> Result<Option<Address>, ApiError> {
        let url = self.endpoint("api/addresses")?;
        let body = self
            .execute(self.request(Method::POST, url).json(address))
            .await?;
        // Some deployments answer with `{ "success": true }`; only an
        // address-shaped body is returned.
        Ok(body.and_then(|text| serde_json::from_str::<Address>(&text).ok()))
    }

    /// `DELETE /api/addresses/{id}`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self), fields(address_id = %id))]
    pub async fn delete_address(&self, id: AddressId) -> Result<(), ApiError> {
        let url = self.endpoint(&format!("api/addresses/{id}"))?;
        self.execute(self.request(Method::DELETE, url)).await?;
        Ok(())
    }
}
