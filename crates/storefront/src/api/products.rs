//! Catalog endpoints (cached).

use quickcommerce_core::{Page, Product, ProductId, ProductQuery};
use reqwest::Method;
use tracing::{debug, instrument};

use super::cache::{CacheKey, CacheValue};
use super::{ApiClient, ApiError};

impl ApiClient {
    /// `GET /api/products/{id}`.
    ///
    /// # Errors
    ///
    /// Returns an error if the product is not found or the request fails.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn get_product(&self, id: ProductId) -> Result<Product, ApiError> {
        let cache_key = CacheKey::Product(id);

        if let Some(CacheValue::Product(product)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for product");
            return Ok(*product);
        }

        let url = self.endpoint(&format!("api/products/{id}"))?;
        let product: Product = self.fetch(self.request(Method::GET, url)).await?;

        self.inner
            .cache
            .insert(cache_key, CacheValue::Product(Box::new(product.clone())))
            .await;

        Ok(product)
    }

    /// `GET /api/products?page&size[&query]`.
    ///
    /// Browsing pages are cached; search results are not.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body is not a page.
    #[instrument(skip(self))]
    pub async fn list_products(&self, query: &ProductQuery) -> Result<Page<Product>, ApiError> {
        let search = query
            .query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty());
        let cache_key = CacheKey::Products {
            page: query.page,
            size: query.size,
        };

        if search.is_none()
            && let Some(CacheValue::Products(page)) = self.inner.cache.get(&cache_key).await
        {
            debug!("Cache hit for products");
            return Ok(page);
        }

        let mut url = self.endpoint("api/products")?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("page", &query.page.to_string())
                .append_pair("size", &query.size.to_string());
            if let Some(search) = search {
                pairs.append_pair("query", search);
            }
        }

        let page: Page<Product> = self.fetch(self.request(Method::GET, url)).await?;

        if search.is_none() {
            for product in &page.content {
                self.inner
                    .cache
                    .insert(
                        CacheKey::Product(product.id),
                        CacheValue::Product(Box::new(product.clone())),
                    )
                    .await;
            }
            self.inner
                .cache
                .insert(cache_key, CacheValue::Products(page.clone()))
                .await;
        }

        Ok(page)
    }

    /// Drop every cached product read.
    pub fn invalidate_products(&self) {
        self.inner.cache.invalidate_all();
    }
}
