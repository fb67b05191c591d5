//! Advertisements, categories and advertisement images.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    AdStatus, AdvertisementId, BusinessProfile, CategoryId, IdentityId, ImageId,
    IndividualProfile, Price, Profile,
};

/// A classified advertisement (`advertisements` table).
///
/// Exactly one of `normal_user_id` / `business_owner_id` is set, depending on
/// the kind of account that posted it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advertisement {
    pub id: AdvertisementId,
    pub title: String,
    pub description: String,
    pub price: Price,
    pub status: AdStatus,
    #[serde(default)]
    pub views_count: i64,
    #[serde(default)]
    pub click_count: i64,
    pub normal_user_id: Option<IdentityId>,
    pub business_owner_id: Option<IdentityId>,
    pub category_id: CategoryId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Advertisement {
    /// Id of whichever account posted this advertisement.
    #[must_use]
    pub fn owner_id(&self) -> Option<&IdentityId> {
        self.business_owner_id
            .as_ref()
            .or(self.normal_user_id.as_ref())
    }
}

/// A listing category (`categories` table). Categories nest one level via
/// `parent_category_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub parent_category_id: Option<CategoryId>,
}

/// An image attached to an advertisement (`images` table).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdImage {
    pub id: ImageId,
    pub advertisement_id: AdvertisementId,
    pub url: String,
    pub order: i32,
}

/// An advertisement joined with its owner, category and images.
///
/// Decoded from a single REST request that embeds the related rows under
/// `normal_user`, `business_owner`, `category` and `images`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AdvertisementDetail {
    #[serde(flatten)]
    pub advertisement: Advertisement,
    #[serde(default)]
    pub normal_user: Option<IndividualProfile>,
    #[serde(default)]
    pub business_owner: Option<BusinessProfile>,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub images: Vec<AdImage>,
}

impl AdvertisementDetail {
    /// The posting account's profile. Business wins if both are present.
    #[must_use]
    pub fn owner(&self) -> Option<Profile> {
        self.business_owner
            .clone()
            .map(Profile::Business)
            .or_else(|| self.normal_user.clone().map(Profile::Individual))
    }

    /// Images in display order.
    #[must_use]
    pub fn ordered_images(&self) -> Vec<&AdImage> {
        let mut images: Vec<&AdImage> = self.images.iter().collect();
        images.sort_by_key(|image| image.order);
        images
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::AccountKind;

    fn detail_json() -> serde_json::Value {
        json!({
            "id": "ad-1",
            "title": "Road bike",
            "description": "Barely used",
            "price": 350,
            "status": "active",
            "views_count": 12,
            "click_count": 3,
            "normal_user_id": "u-1",
            "business_owner_id": null,
            "category_id": "cat-1",
            "created_at": "2024-05-01T10:00:00+00:00",
            "updated_at": "2024-05-02T10:00:00+00:00",
            "normal_user": {
                "id": "u-1",
                "email": "a@x.com",
                "full_name": "Ann",
                "phone": "555",
                "profile_image": null
            },
            "business_owner": null,
            "category": { "id": "cat-1", "name": "Vehicles", "parent_category_id": null },
            "images": [
                { "id": "img-2", "advertisement_id": "ad-1", "url": "https://cdn/2.jpg", "order": 2 },
                { "id": "img-1", "advertisement_id": "ad-1", "url": "https://cdn/1.jpg", "order": 1 }
            ]
        })
    }

    #[test]
    fn test_decode_embedded_detail() {
        let detail: AdvertisementDetail = serde_json::from_value(detail_json()).unwrap();

        assert_eq!(detail.advertisement.title, "Road bike");
        assert_eq!(detail.advertisement.price.to_string(), "350.00");
        assert_eq!(detail.advertisement.owner_id().unwrap().as_str(), "u-1");
        assert_eq!(detail.owner().unwrap().kind(), AccountKind::Individual);
        assert_eq!(detail.category.as_ref().unwrap().name, "Vehicles");

        let urls: Vec<&str> = detail.ordered_images().iter().map(|i| i.url.as_str()).collect();
        assert_eq!(urls, vec!["https://cdn/1.jpg", "https://cdn/2.jpg"]);
    }

    #[test]
    fn test_decode_detail_without_embeds() {
        let mut value = detail_json();
        let object = value.as_object_mut().unwrap();
        object.remove("normal_user");
        object.remove("business_owner");
        object.remove("category");
        object.remove("images");

        let detail: AdvertisementDetail = serde_json::from_value(value).unwrap();
        assert!(detail.owner().is_none());
        assert!(detail.images.is_empty());
    }
}
