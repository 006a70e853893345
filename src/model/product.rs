use bon::bon;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{
    TaxpayerId,
    validation::{self, Validate, ValidationError},
};

pub(crate) const TNVED_MIN_CHARS: usize = 4;
pub(crate) const UIT_MAX_DIGITS: usize = 10;

/// One line item of an introduce-goods document.
///
/// Fields are declared in wire order; serialization follows declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_document: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_document_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_document_number: Option<String>,
    pub owner_inn: TaxpayerId,
    pub producer_inn: TaxpayerId,
    pub production_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tnved_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uit_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uitu_code: Option<String>,
}

#[bon]
impl Product {
    /// Builds a product, checking every field.
    ///
    /// ```rust
    /// use chrono::NaiveDate;
    /// use crpt_api::model::Product;
    ///
    /// let product = Product::builder()
    ///     .owner_inn("7707083893")
    ///     .producer_inn("7728168971")
    ///     .production_date(NaiveDate::from_ymd_opt(2020, 1, 23).unwrap())
    ///     .tnved_code("6401100000")
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(product.tnved_code.as_deref(), Some("6401100000"));
    /// ```
    #[builder]
    pub fn new(
        #[builder(into)] owner_inn: String,
        #[builder(into)] producer_inn: String,
        production_date: NaiveDate,
        #[builder(into)] certificate_document: Option<String>,
        certificate_document_date: Option<NaiveDate>,
        #[builder(into)] certificate_document_number: Option<String>,
        #[builder(into)] tnved_code: Option<String>,
        #[builder(into)] uit_code: Option<String>,
        #[builder(into)] uitu_code: Option<String>,
    ) -> Result<Self, ValidationError> {
        let product = Self {
            certificate_document,
            certificate_document_date,
            certificate_document_number,
            owner_inn: TaxpayerId::for_field("owner_inn", owner_inn)?,
            producer_inn: TaxpayerId::for_field("producer_inn", producer_inn)?,
            production_date,
            tnved_code,
            uit_code,
            uitu_code,
        };
        product.validate()?;
        Ok(product)
    }
}

impl Validate for Product {
    fn validate(&self) -> Result<(), ValidationError> {
        if let Some(code) = &self.tnved_code {
            validation::min_chars("tnved_code", code, TNVED_MIN_CHARS)?;
        }
        if let Some(code) = &self.uit_code {
            validation::digits("uit_code", code, UIT_MAX_DIGITS)?;
        }
        if let Some(code) = &self.uitu_code {
            validation::digits("uitu_code", code, UIT_MAX_DIGITS)?;
        }
        Ok(())
    }
}
