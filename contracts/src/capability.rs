//! # Capability Issuance & Binding
//!
//! A capability is an object whose possession *is* the authorization. Three
//! kinds exist:
//!
//! - [`AdminCap`] governs one vault.
//! - [`FarmCap`] governs one farm.
//! - [`TradeCap`] delegates trading over one balance manager.
//!
//! ## Security Model
//!
//! - **Bind before return**: the issuer creates the capability and transfers
//!   it to the requesting account in the same step. The only thing a caller
//!   ever receives is an [`Owned`] handle, and `Owned` can only be produced
//!   by a ledger transfer, so an unbound capability never escapes.
//! - **No forging**: capability fields are private and the minting trait is
//!   crate-private. Code outside this crate cannot build one.
//! - **One live instance**: issuing fails with `AlreadyIssued` while another
//!   capability of the same kind is live for the same resource. Rotation
//!   burns the old one before minting the new one, inside one transaction.

use std::fmt;

use ferrum_ledger::{Address, Key, LedgerError, ObjectId, Owned, TxContext, Uid};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::events::{self, EventKind};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised while issuing or handling capabilities.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CapabilityError {
    /// The sender does not hold the capability.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// A capability of this kind is already live for the resource.
    #[error("{kind} capability already issued for resource {resource}")]
    AlreadyIssued {
        /// Capability kind.
        kind: CapabilityKind,
        /// Governed resource.
        resource: ObjectId,
    },

    /// The governed resource does not exist in this transaction's view.
    #[error("governed resource {0} is not committed")]
    ResourceNotCommitted(ObjectId),

    /// Underlying runtime failure.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

// ---------------------------------------------------------------------------
// Capability trait
// ---------------------------------------------------------------------------

/// The capability families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityKind {
    Admin,
    Farm,
    Trade,
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapabilityKind::Admin => write!(f, "admin"),
            CapabilityKind::Farm => write!(f, "farm"),
            CapabilityKind::Trade => write!(f, "trade"),
        }
    }
}

mod sealed {
    pub trait Sealed {}
}

/// A capability bound to exactly one governed resource.
pub trait Capability: Key + sealed::Sealed {
    /// Which family this capability belongs to.
    const KIND: CapabilityKind;

    /// Id of the resource this capability governs.
    fn governed_id(&self) -> ObjectId;
}

/// Construction, reserved to this crate.
pub(crate) trait Mint: Capability + Sized {
    fn bind(id: Uid, governed: ObjectId) -> Self;
}

macro_rules! capability {
    ($(#[$meta:meta])* $name:ident, $kind:ident, $governed:ident) => {
        $(#[$meta])*
        #[derive(Debug)]
        pub struct $name {
            id: Uid,
            $governed: ObjectId,
        }

        impl $name {
            /// Id of the governed resource.
            pub fn $governed(&self) -> ObjectId {
                self.$governed
            }

            /// Destroys the capability. Only its holder can. A refused burn
            /// leaves the handle usable.
            pub fn burn(cap: &Owned<Self>, ctx: &mut TxContext<'_>) -> Result<(), CapabilityError> {
                burn_capability(cap, ctx)
            }

            /// Hands the capability to `recipient`. Only its holder can.
            pub fn transfer(
                cap: Owned<Self>,
                recipient: Address,
                ctx: &mut TxContext<'_>,
            ) -> Result<Owned<Self>, CapabilityError> {
                transfer_capability(cap, recipient, ctx)
            }
        }

        impl Key for $name {
            fn uid(&self) -> &Uid {
                &self.id
            }

            fn bound_to(&self) -> Option<ObjectId> {
                Some(self.$governed)
            }
        }

        impl sealed::Sealed for $name {}

        impl Capability for $name {
            const KIND: CapabilityKind = CapabilityKind::$kind;

            fn governed_id(&self) -> ObjectId {
                self.$governed
            }
        }

        impl Mint for $name {
            fn bind(id: Uid, governed: ObjectId) -> Self {
                Self { id, $governed: governed }
            }
        }
    };
}

capability!(
    /// Administrative authority over one vault.
    AdminCap,
    Admin,
    vault_id
);

capability!(
    /// Administrative authority over one farm.
    FarmCap,
    Farm,
    farm_id
);

capability!(
    /// Delegated trading authority over one balance manager.
    TradeCap,
    Trade,
    balance_manager_id
);

// ---------------------------------------------------------------------------
// Issuer
// ---------------------------------------------------------------------------

/// Mints a capability of kind `C` for `governed` and binds it to `recipient`.
///
/// The transfer happens before this function returns; there is no path that
/// yields the raw capability.
pub(crate) fn issue<C: Mint>(
    governed: ObjectId,
    recipient: Address,
    ctx: &mut TxContext<'_>,
) -> Result<Owned<C>, CapabilityError> {
    if !ctx.is_known(governed) {
        return Err(CapabilityError::ResourceNotCommitted(governed));
    }
    if !ctx.live_bound(C::type_tag(), governed).is_empty() {
        return Err(CapabilityError::AlreadyIssued {
            kind: C::KIND,
            resource: governed,
        });
    }

    let cap = C::bind(ctx.new_uid(), governed);
    let capability_id = cap.id();
    let owned = ctx.transfer(cap, recipient);

    events::emit(
        ctx,
        EventKind::CapabilityIssued,
        governed,
        Some(capability_id),
        &[],
    );
    info!(
        kind = %C::KIND,
        capability = %capability_id,
        resource = %governed,
        owner = %recipient,
        "capability issued"
    );
    Ok(owned)
}

/// Burns `old` and mints its replacement for `new_owner`. Both happen in the
/// caller's transaction, so two valid capabilities never coexist. The old
/// handle stays with the caller and goes stale once the rotation commits.
pub(crate) fn rotate<C: Mint>(
    old: &Owned<C>,
    new_owner: Address,
    ctx: &mut TxContext<'_>,
) -> Result<Owned<C>, CapabilityError> {
    let governed = old.object().governed_id();
    burn_capability(old, ctx)?;
    issue::<C>(governed, new_owner, ctx)
}

fn burn_capability<C: Mint>(
    cap: &Owned<C>,
    ctx: &mut TxContext<'_>,
) -> Result<(), CapabilityError> {
    let governed = cap.check(ctx).map_err(unauthorized)?.governed_id();
    let capability_id = cap.id();
    ctx.delete_owned(cap).map_err(unauthorized)?;

    events::emit(
        ctx,
        EventKind::CapabilityBurned,
        governed,
        Some(capability_id),
        &[],
    );
    info!(kind = %C::KIND, capability = %capability_id, "capability burned");
    Ok(())
}

fn transfer_capability<C: Mint>(
    cap: Owned<C>,
    recipient: Address,
    ctx: &mut TxContext<'_>,
) -> Result<Owned<C>, CapabilityError> {
    let cap = ctx.unwrap_owned(cap).map_err(unauthorized)?;
    let capability_id = cap.id();
    let governed = cap.governed_id();
    let owned = ctx.transfer(cap, recipient);

    events::emit(
        ctx,
        EventKind::CapabilityTransferred,
        governed,
        Some(capability_id),
        &[],
    );
    info!(
        kind = %C::KIND,
        capability = %capability_id,
        to = %recipient,
        "capability transferred"
    );
    Ok(owned)
}

/// Maps an ownership failure to `Unauthorized`; other runtime errors pass
/// through.
pub(crate) fn unauthorized(err: LedgerError) -> CapabilityError {
    match err {
        LedgerError::NotOwner { .. } | LedgerError::ObjectNotFound(_) => {
            CapabilityError::Unauthorized(err.to_string())
        }
        other => CapabilityError::Ledger(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrum_ledger::{Ledger, Owner, Shared};

    /// A stand-in governed resource.
    #[derive(Debug)]
    struct Resource {
        id: Uid,
    }

    impl Key for Resource {
        fn uid(&self) -> &Uid {
            &self.id
        }
    }

    fn alice() -> Address {
        Address::from_label("alice")
    }

    fn bob() -> Address {
        Address::from_label("bob")
    }

    fn resource_with_admin(ledger: &Ledger) -> (Shared<Resource>, Owned<AdminCap>) {
        ledger
            .execute(alice(), |ctx| {
                let resource = Resource { id: ctx.new_uid() };
                let cap = issue::<AdminCap>(resource.id(), ctx.sender(), ctx)?;
                let resource = ctx.share(resource)?;
                Ok::<_, CapabilityError>((resource, cap))
            })
            .unwrap()
    }

    #[test]
    fn issued_capability_is_owned_by_requester() {
        let ledger = Ledger::new();
        let (resource, cap) = resource_with_admin(&ledger);

        assert_eq!(cap.owner(), alice());
        assert_eq!(ledger.owner_of(cap.id()), Some(Owner::Address(alice())));
        assert_eq!(cap.object().vault_id(), resource.id());

        let issued = ledger.events_of_kind("capability_issued");
        assert_eq!(issued.len(), 1);
        assert_eq!(issued[0].capability_id, Some(cap.id()));
        assert_eq!(issued[0].resource_id, resource.id());
    }

    #[test]
    fn second_capability_of_same_kind_rejected() {
        let ledger = Ledger::new();
        let (resource, _cap) = resource_with_admin(&ledger);
        let resource_id = resource.id();

        let result = ledger.execute(bob(), |ctx| issue::<AdminCap>(resource_id, bob(), ctx));
        assert_eq!(
            result.unwrap_err(),
            CapabilityError::AlreadyIssued {
                kind: CapabilityKind::Admin,
                resource: resource_id,
            }
        );
        assert_eq!(ledger.live_bound(AdminCap::type_tag(), resource_id).len(), 1);
    }

    #[test]
    fn other_kinds_are_independent() {
        let ledger = Ledger::new();
        let (resource, _admin) = resource_with_admin(&ledger);
        let resource_id = resource.id();

        let farm_cap = ledger
            .execute(alice(), |ctx| issue::<FarmCap>(resource_id, alice(), ctx))
            .unwrap();
        assert_eq!(farm_cap.object().farm_id(), resource_id);
    }

    #[test]
    fn unknown_resource_rejected() {
        let ledger = Ledger::new();
        let ghost = ObjectId::from_bytes([0xee; 32]);
        let result = ledger.execute(alice(), |ctx| issue::<AdminCap>(ghost, alice(), ctx));
        assert_eq!(
            result.unwrap_err(),
            CapabilityError::ResourceNotCommitted(ghost)
        );
        assert_eq!(ledger.object_count(), 0);
    }

    #[test]
    fn only_holder_can_burn() {
        let ledger = Ledger::new();
        let (_resource, cap) = resource_with_admin(&ledger);
        let cap_id = cap.id();

        let result = ledger.execute(bob(), |ctx| AdminCap::burn(&cap, ctx));
        assert!(matches!(result, Err(CapabilityError::Unauthorized(_))));
        assert!(ledger.object(cap_id).is_some());

        // The holder's handle survived the refusal.
        ledger
            .execute(alice(), |ctx| AdminCap::burn(&cap, ctx))
            .unwrap();
        assert!(ledger.object(cap_id).is_none());
    }

    #[test]
    fn burn_removes_capability() {
        let ledger = Ledger::new();
        let (resource, cap) = resource_with_admin(&ledger);
        let cap_id = cap.id();

        ledger
            .execute(alice(), |ctx| AdminCap::burn(&cap, ctx))
            .unwrap();

        assert!(ledger.object(cap_id).is_none());
        assert!(ledger
            .live_bound(AdminCap::type_tag(), resource.id())
            .is_empty());
        assert_eq!(ledger.events_of_kind("capability_burned").len(), 1);
    }

    #[test]
    fn rotation_never_leaves_two_live() {
        let ledger = Ledger::new();
        let (resource, old) = resource_with_admin(&ledger);
        let old_id = old.id();

        let new = ledger
            .execute(alice(), |ctx| rotate(&old, bob(), ctx))
            .unwrap();

        assert_ne!(new.id(), old_id);
        assert_eq!(new.owner(), bob());
        assert!(ledger.object(old_id).is_none());
        assert_eq!(
            ledger.live_bound(AdminCap::type_tag(), resource.id()),
            vec![new.id()]
        );

        // The stale handle cannot rotate again.
        let result = ledger.execute(alice(), |ctx| rotate(&old, alice(), ctx));
        assert!(matches!(result, Err(CapabilityError::Unauthorized(_))));
    }

    #[test]
    fn aborted_rotation_keeps_old_capability() {
        let ledger = Ledger::new();
        let (resource, old) = resource_with_admin(&ledger);

        let result = ledger.execute(alice(), |ctx| {
            rotate(&old, bob(), ctx)?;
            Err::<(), _>(CapabilityError::ResourceNotCommitted(resource.id()))
        });
        assert!(result.is_err());
        assert_eq!(
            ledger.live_bound(AdminCap::type_tag(), resource.id()),
            vec![old.id()]
        );
        ledger
            .execute(alice(), |ctx| AdminCap::burn(&old, ctx))
            .unwrap();
    }

    #[test]
    fn transfer_moves_ownership() {
        let ledger = Ledger::new();
        let (_resource, cap) = resource_with_admin(&ledger);

        let cap = ledger
            .execute(alice(), |ctx| AdminCap::transfer(cap, bob(), ctx))
            .unwrap();

        assert_eq!(cap.owner(), bob());
        assert_eq!(ledger.owner_of(cap.id()), Some(Owner::Address(bob())));

        // The new holder can prove possession; the old one could not.
        ledger
            .execute(bob(), |ctx| {
                cap.check(ctx)?;
                Ok::<_, LedgerError>(())
            })
            .unwrap();
    }
}
