//! Shared fixture for the engine integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use dealbook_engine::{Marketplace, MemorySink, RolePolicy};
use dealbook_ledger::InMemoryLedger;
use dealbook_types::*;
use rust_decimal::Decimal;

pub fn dec(n: i64) -> Decimal {
    Decimal::new(n, 0)
}

/// A marketplace over an in-memory ledger with a role policy and an
/// in-memory event sink, plus one admin and one entrepreneur.
pub struct Fixture {
    pub ledger: Arc<InMemoryLedger>,
    pub policy: Arc<RolePolicy>,
    pub sink: Arc<MemorySink>,
    pub market: Marketplace,
    pub admin: UserId,
    pub owner: UserId,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(MarketplaceConfig::default())
    }

    pub fn with_config(config: MarketplaceConfig) -> Self {
        let ledger = Arc::new(InMemoryLedger::new());
        let policy = Arc::new(RolePolicy::new());
        let sink = Arc::new(MemorySink::new());
        let market = Marketplace::new(ledger.clone(), policy.clone(), config)
            .expect("valid config")
            .with_sink(sink.clone());

        let admin = UserId::new();
        let owner = UserId::new();
        policy.assign(admin, Role::Admin);
        policy.assign(owner, Role::Entrepreneur);

        Self {
            ledger,
            policy,
            sink,
            market,
            admin,
            owner,
        }
    }

    pub fn user(&self, role: Role) -> UserId {
        let user = UserId::new();
        self.policy.assign(user, role);
        user
    }

    pub fn investment_request(&self) -> Request {
        self.market
            .create_request(
                self.owner,
                BusinessId::new(),
                RequestKind::Investment,
                None,
                "Seed round",
            )
            .expect("request created")
    }

    pub fn offer(&self, request: &Request, amount: Decimal) -> (UserId, Offer) {
        let investor = self.user(Role::Investor);
        let offer = self
            .market
            .submit_offer(request.id, investor, OfferTerms::investment(amount, Decimal::TEN))
            .expect("offer submitted");
        (investor, offer)
    }

    /// An active deal formed from a single 1000 offer: net 980.
    pub fn deal(&self) -> (UserId, Deal) {
        let request = self.investment_request();
        let (investor, offer) = self.offer(&request, dec(1000));
        let deal = self
            .market
            .accept_offer(offer.id, self.owner)
            .expect("offer accepted");
        (investor, deal)
    }

    /// Request and approve a withdrawal by the owner.
    pub fn approved_withdrawal(&self, deal: &Deal, amount: Decimal) -> Withdrawal {
        let w = self
            .market
            .request_withdrawal(deal.id, self.owner, amount, "supplier invoice")
            .expect("withdrawal requested");
        self.market
            .approve_withdrawal(w.id, self.admin)
            .expect("withdrawal approved")
    }

    pub fn balance(&self, deal: &Deal) -> Decimal {
        self.market.deal(deal.id).expect("deal stored").balance
    }

    /// Whole-store invariants and journal chain.
    pub fn assert_consistent(&self) {
        self.ledger.audit().expect("ledger audit");
        self.ledger.verify_journal().expect("journal chain");
    }
}
