//! Request lifecycle: creation, admin status override and closing.

use dealbook_ledger::{Write, WriteSet};
use dealbook_types::offer::REQUEST_CLOSED;
use dealbook_types::{
    Action, BusinessId, DealbookError, EntityRef, MarketEvent, Request, RequestId, RequestKind,
    RequestStatus, Result, SupplyKind, UserId,
};
use tracing::info;

use crate::marketplace::{Marketplace, Step};

impl Marketplace {
    /// Post a new `open` request owned by `owner`.
    ///
    /// # Errors
    /// - `InvalidRequest` for a blank or over-long title, or a
    ///   `supply_kind` that does not match `kind`
    /// - `NotAuthorized` if the gate refuses `CreateRequest`
    pub fn create_request(
        &self,
        owner: UserId,
        business: BusinessId,
        kind: RequestKind,
        supply_kind: Option<SupplyKind>,
        title: &str,
    ) -> Result<Request> {
        self.check_text(title, "title")
            .map_err(|reason| DealbookError::InvalidRequest { reason })?;
        let request = Request::new(owner, business, kind, supply_kind, title)?;
        self.authorize(owner, Action::CreateRequest, EntityRef::Request(request.id))?;

        let created = self.transact("create_request", || {
            let set = WriteSet::new()
                .write(Write::InsertRequest(request.clone()))
                .event(MarketEvent::RequestCreated {
                    request_id: request.id,
                    owner_id: owner,
                });
            Ok(Step::Commit(set, request.clone()))
        })?;

        info!(request_id = %created.id, %owner, kind = ?created.kind, "Request created");
        Ok(created)
    }

    /// Administrative status override.
    ///
    /// Allowed: `open ↔ under_review`, `open|under_review → closed`,
    /// `in_progress → completed`, `completed → closed`. `in_progress` is
    /// only reachable through offer acceptance. Closing an open request
    /// rejects its pending offers as [`close_request`](Self::close_request)
    /// does.
    ///
    /// # Errors
    /// - `RequestNotFound`
    /// - `NotAuthorized` without `OverrideRequestStatus`
    /// - `InvalidRequestTransition` for any other move
    pub fn set_request_status(
        &self,
        request_id: RequestId,
        actor: UserId,
        status: RequestStatus,
    ) -> Result<Request> {
        let updated = self.transact("set_request_status", || {
            let current = self.load_request(request_id)?;
            self.authorize(actor, Action::OverrideRequestStatus, EntityRef::Request(request_id))?;

            let from = current.row.status;
            if status == RequestStatus::InProgress {
                return Err(DealbookError::InvalidRequestTransition { from, to: status });
            }
            let mut row = current.row.clone();
            row.transition_to(status)?;

            let mut set = WriteSet::new().write(Write::UpdateRequest {
                expected: current.version,
                row: row.clone(),
            });
            set.push_event(MarketEvent::RequestStatusChanged {
                request_id,
                from,
                to: status,
                actor,
            });
            if status == RequestStatus::Closed && from.accepts_offers() {
                set.push_write(Write::RejectPendingOffers {
                    request_id,
                    except: None,
                    reason: REQUEST_CLOSED.to_string(),
                });
            }
            Ok(Step::Commit(set, row))
        })?;

        info!(%request_id, %actor, status = %updated.status, "Request status overridden");
        Ok(updated)
    }

    /// Close an `open`/`under_review` request, rejecting every pending
    /// offer with reason `"request closed"` in the same commit.
    ///
    /// The owner may close their own request; anyone else needs the
    /// `OverrideRequestStatus` grant as well.
    ///
    /// # Errors
    /// - `RequestNotFound`
    /// - `NotAuthorized`
    /// - `RequestNotOpen` once the request left `open`/`under_review`
    pub fn close_request(&self, request_id: RequestId, actor: UserId) -> Result<Request> {
        let closed = self.transact("close_request", || {
            let current = self.load_request(request_id)?;
            let entity = EntityRef::Request(request_id);
            self.authorize(actor, Action::CloseRequest, entity)?;
            if !current.row.is_owned_by(actor) {
                self.authorize(actor, Action::OverrideRequestStatus, entity)?;
            }

            let from = current.row.status;
            if !from.accepts_offers() {
                return Err(DealbookError::RequestNotOpen {
                    id: request_id,
                    status: from,
                });
            }
            let mut row = current.row.clone();
            row.transition_to(RequestStatus::Closed)?;

            let set = WriteSet::new()
                .write(Write::UpdateRequest {
                    expected: current.version,
                    row: row.clone(),
                })
                .write(Write::RejectPendingOffers {
                    request_id,
                    except: None,
                    reason: REQUEST_CLOSED.to_string(),
                })
                .event(MarketEvent::RequestStatusChanged {
                    request_id,
                    from,
                    to: RequestStatus::Closed,
                    actor,
                });
            Ok(Step::Commit(set, row))
        })?;

        info!(%request_id, %actor, "Request closed");
        Ok(closed)
    }
}
