//! Demo data for local runs.

use log::info;
use thiserror::Error;

use crate::accounts::{AccountError, AccountManager, NewUser, User};
use crate::inventory::{InventoryError, InventoryManager, Item, NewItem, TransactionType};
use crate::ledger::{LedgerError, LedgerManager};

/// Seeding errors
#[derive(Debug, Error)]
pub enum SeedError {
    #[error(transparent)]
    Account(#[from] AccountError),

    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Accounts and listings created by [`seed_demo`]
#[derive(Debug, Clone)]
pub struct DemoData {
    pub seller: User,
    pub buyer: User,
    pub items: Vec<Item>,
}

pub const DEMO_SELLER_EMAIL: &str = "alex@example.com";
pub const DEMO_BUYER_EMAIL: &str = "jordan@example.com";

/// Create the demo seller, a funded demo buyer and two listings
///
/// Returns `None` when the demo seller already exists.
pub async fn seed_demo(
    accounts: &AccountManager,
    inventory: &InventoryManager,
    ledger: &LedgerManager,
) -> Result<Option<DemoData>, SeedError> {
    let seller = match accounts
        .create_user(
            NewUser::new(DEMO_SELLER_EMAIL, "Alex Rivera")
                .with_trust_score(92)
                .with_avatar("https://i.pravatar.cc/150?u=u1"),
        )
        .await
    {
        Ok(user) => user,
        Err(AccountError::EmailTaken) => {
            info!("Demo data already present, skipping seed");
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };
    let buyer = accounts
        .create_user(
            NewUser::new(DEMO_BUYER_EMAIL, "Jordan Lee")
                .with_avatar("https://i.pravatar.cc/150?u=u2"),
        )
        .await?;

    ledger
        .top_up(seller.id, 45_000, Some("Opening balance".to_string()))
        .await?;
    ledger
        .top_up(buyer.id, 60_000, Some("Opening balance".to_string()))
        .await?;

    let listings = [
        NewItem {
            title: "Acne Studios Leather Jacket".to_string(),
            category: "Jackets".to_string(),
            brand: "Acne Studios".to_string(),
            size: "M".to_string(),
            condition: "A".to_string(),
            transaction_type: TransactionType::Both,
            sale_price: Some(28_500),
            rent_price: Some(1500),
            deposit: Some(8000),
            image: "https://images.unsplash.com/photo-1551028917-a48010bd8f3b?q=80&w=1000"
                .to_string(),
            verified: true,
            seller_id: seller.id,
        },
        NewItem {
            title: "Zimmermann Silk Dress".to_string(),
            category: "Dresses".to_string(),
            brand: "Zimmermann".to_string(),
            size: "S".to_string(),
            condition: "A".to_string(),
            transaction_type: TransactionType::Rent,
            sale_price: None,
            rent_price: Some(3200),
            deposit: Some(10_000),
            image: "https://images.unsplash.com/photo-1568252542512-9fe8fe9c87bb?q=80&w=1000"
                .to_string(),
            verified: true,
            seller_id: seller.id,
        },
    ];

    let mut items = Vec::with_capacity(listings.len());
    for listing in listings {
        items.push(inventory.list_item(listing).await?);
    }

    info!(
        "Seeded demo data: seller {}, buyer {}, {} listings",
        seller.id,
        buyer.id,
        items.len()
    );

    // Balances changed after creation
    let seller = accounts.get_user(seller.id).await?;
    let buyer = accounts.get_user(buyer.id).await?;
    Ok(Some(DemoData {
        seller,
        buyer,
        items,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::ledger::Balances;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let accounts = AccountManager::new(store.clone());
        let inventory = InventoryManager::new(store.clone());
        let ledger = LedgerManager::new(store);

        let demo = seed_demo(&accounts, &inventory, &ledger)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(demo.seller.trust_score, 92);
        assert_eq!(demo.seller.balances, Balances::new(45_000, 0));
        assert_eq!(demo.items.len(), 2);

        assert!(seed_demo(&accounts, &inventory, &ledger).await.unwrap().is_none());
    }
}
