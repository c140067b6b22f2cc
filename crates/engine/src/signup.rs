use std::collections::{HashMap, VecDeque};

use typed_builder::TypedBuilder;
use uptree_model::{
    locate, locate_at, ActivationId, Amount, DistributionParams, MemberAccount, MemberCode,
    MemberId, Placement, Rank, Side, TreeNode,
};

use crate::{
    distributor::{LevelDistributor, ReferralDistributor},
    ledger::LedgerWriter,
    provider::{CustomClaims, IdentityProvider, SessionToken},
    store::{MemberDocument, MemberProfile, MemberStore, MemberStoreExt, StoreError},
};

/// Result of the rate-limit pre-check performed outside the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Under the limit; proceed.
    Proceed,
    /// Over the limit; deny without running core logic.
    Deny,
}

/// An explicitly requested placement slot.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PlacementTarget {
    /// The member to attach under.
    pub target: MemberId,
    /// The requested side. Occupied is an error, never a fallback.
    pub side: Side,
}

/// Signup input. Field-shape validation is assumed already done by the
/// caller.
#[derive(Debug, Clone, TypedBuilder, serde::Serialize, serde::Deserialize)]
pub struct SignupRequest {
    /// Display name.
    #[builder(setter(into))]
    pub display_name: String,
    /// Unique email.
    #[builder(setter(into))]
    pub email: String,
    /// Password, handed to the identity provider only.
    #[builder(setter(into))]
    pub password: String,
    /// Unique contact number.
    #[builder(setter(into))]
    pub phone: String,
    /// Unique wallet address.
    #[builder(setter(into))]
    pub wallet_address: String,
    /// Referring sponsor. `None` only for the root signup.
    #[builder(default, setter(strip_option))]
    pub sponsor: Option<MemberId>,
    /// Preferred side under the sponsor.
    #[builder(default)]
    pub preferred_side: Side,
    /// Explicit placement target, overriding the locator's search.
    #[builder(default, setter(strip_option))]
    pub placement: Option<PlacementTarget>,
}

/// Dashboard-facing aggregate of a member.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MemberSummary {
    /// Member id.
    pub id: MemberId,
    /// Unique code.
    pub code: MemberCode,
    /// Current rank.
    pub rank: Rank,
    /// Tree depth, root = 1.
    pub level: u32,
    /// Tree parent.
    pub upline: Option<MemberId>,
    /// Referring sponsor.
    pub sponsor: Option<MemberId>,
    /// Withdrawable balance.
    pub available_balance: Amount,
    /// Locked pool balance across all ranks.
    pub pool_balance: Amount,
    /// Lifetime credited earnings.
    pub total_earnings: Amount,
    /// Direct referral count.
    pub direct_referrals: u32,
    /// Claim-eligibility gate.
    pub claim_eligible: bool,
}

impl MemberSummary {
    fn try_from_document(document: &MemberDocument) -> crate::Result<Self> {
        let account = &document.account;
        let pool_balance = account
            .pool_balances
            .values()
            .try_fold(Amount::ZERO, |acc, balance| acc.checked_add(balance))?;
        Ok(Self {
            id: document.id().clone(),
            code: document.code.clone(),
            rank: account.rank,
            level: document.node.level,
            upline: document.node.upline.clone(),
            sponsor: document.node.sponsor.clone(),
            available_balance: account.available_balance,
            pool_balance,
            total_earnings: account.total_earnings,
            direct_referrals: account.direct_referrals,
            claim_eligible: account.claim_eligible,
        })
    }
}

/// Successful signup payload.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SignupResponse {
    /// The new member's id.
    pub member: MemberId,
    /// Fresh session credential.
    pub session_token: SessionToken,
    /// Aggregate view of the new member.
    pub summary: MemberSummary,
}

/// States of the signup flow.
///
/// `Failed` is reachable from every non-terminal state; compensation
/// (deleting an orphaned identity account) runs on the
/// `MemberCreated → Failed` edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignupState {
    /// Uniqueness checks.
    Validating,
    /// Locating the tree slot.
    PlacementPending,
    /// Identity account and member document creation.
    MemberCreated,
    /// Referral and level distribution.
    DistributingIncome,
    /// Terminal success.
    Complete,
    /// Terminal failure.
    Failed,
}

/// Composes validation, placement, member creation and income
/// distribution into one logically atomic signup.
#[derive(Debug, TypedBuilder)]
pub struct SignupOrchestrator<S, P> {
    store: S,
    provider: P,
    #[builder(default)]
    params: DistributionParams,
    /// Locate-and-claim attempts before surfacing `Aborted`.
    #[builder(default = 3)]
    max_txn_attempts: u32,
}

impl<S: MemberStore, P: IdentityProvider> SignupOrchestrator<S, P> {
    /// Get the injected params.
    pub fn params(&self) -> &DistributionParams {
        &self.params
    }

    /// Get the store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Get the identity provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Get the aggregate view of an existing member.
    pub async fn member_summary(&self, member: &MemberId) -> crate::Result<MemberSummary> {
        let document = self.store.try_member(member).await?;
        MemberSummary::try_from_document(&document)
    }

    /// Run one signup to completion.
    ///
    /// Callers receive either the full success payload or one
    /// structured error; a created identity account never outlives a
    /// failed member creation.
    pub async fn signup(
        &self,
        request: SignupRequest,
        admission: Admission,
    ) -> crate::Result<SignupResponse> {
        if admission == Admission::Deny {
            return Err(crate::Error::RateLimited);
        }
        let mut state = SignupState::Validating;
        let result = self.run(&mut state, request).await;
        match &result {
            Ok(response) => {
                tracing::info!(member = %response.member, "signup complete");
            }
            Err(err) => {
                tracing::warn!(%err, code = ?err.code(), failed_from = ?state, "signup failed");
            }
        }
        result
    }

    async fn run(
        &self,
        state: &mut SignupState,
        request: SignupRequest,
    ) -> crate::Result<SignupResponse> {
        self.validate(&request).await?;

        *state = SignupState::PlacementPending;
        let placement = self.locate_placement(&request).await?;

        *state = SignupState::MemberCreated;
        let (member, account_id) = self.create_member(&request, placement).await?;

        *state = SignupState::DistributingIncome;
        let activation = ActivationId::new(format!("signup:{member}"));
        self.distribute(&member, request.sponsor.as_ref(), &activation)
            .await;

        let claims = self.store.try_member(&member).await?;
        if let Err(err) = self
            .provider
            .set_custom_claims(
                &account_id,
                CustomClaims {
                    member_code: claims.code.clone(),
                    rank: claims.account.rank,
                },
            )
            .await
        {
            tracing::warn!(%member, %err, "setting custom claims failed");
        }

        let session_token = self.provider.issue_session_token(&account_id).await?;
        let summary = MemberSummary::try_from_document(&claims)?;
        *state = SignupState::Complete;
        Ok(SignupResponse {
            member,
            session_token,
            summary,
        })
    }

    async fn validate(&self, request: &SignupRequest) -> crate::Result<()> {
        if request.email.is_empty() || request.password.is_empty() {
            return Err(crate::Error::InvalidArgument(
                "email and password are required".into(),
            ));
        }
        if self.provider.account_by_email(&request.email).await?.is_some()
            || self.store.find_by_email(&request.email).await?.is_some()
        {
            return Err(crate::Error::AlreadyExists("email already registered".into()));
        }
        if self.store.find_by_contact(&request.phone).await?.is_some() {
            return Err(crate::Error::AlreadyExists(
                "contact number already registered".into(),
            ));
        }
        if self
            .store
            .find_by_wallet(&request.wallet_address)
            .await?
            .is_some()
        {
            return Err(crate::Error::AlreadyExists(
                "wallet address already registered".into(),
            ));
        }
        Ok(())
    }

    async fn locate_placement(&self, request: &SignupRequest) -> crate::Result<Placement> {
        if let Some(explicit) = &request.placement {
            let snapshot = self.load_subtree(Some(&explicit.target)).await?;
            return locate_at(&snapshot, &explicit.target, explicit.side).map_err(|err| match err
            {
                uptree_model::Error::SlotOccupied(_) => {
                    crate::Error::FailedPrecondition("Position already occupied".into())
                }
                uptree_model::Error::MemberNotFound => {
                    crate::Error::NotFound("placement target not found".into())
                }
                other => other.into(),
            });
        }
        let snapshot = self.load_subtree(request.sponsor.as_ref()).await?;
        locate(&snapshot, request.sponsor.as_ref(), request.preferred_side).map_err(
            |err| match err {
                uptree_model::Error::MemberNotFound => {
                    crate::Error::NotFound("sponsor not found".into())
                }
                other => other.into(),
            },
        )
    }

    /// Fetch the nodes the locator can reach, in its own search order.
    ///
    /// Fetching stops at the first node with a free left slot, which is
    /// also where the locator's spillover search stops.
    async fn load_subtree(
        &self,
        root: Option<&MemberId>,
    ) -> crate::Result<HashMap<MemberId, TreeNode>> {
        let mut nodes = HashMap::new();
        let Some(root) = root else {
            return Ok(nodes);
        };
        let mut queue = VecDeque::from([root.clone()]);
        while let Some(id) = queue.pop_front() {
            if nodes.contains_key(&id) {
                continue;
            }
            let Some(document) = self.store.member(&id).await? else {
                continue;
            };
            let node = document.node;
            let stop = node.left.is_none();
            for child in [node.left.clone(), node.right.clone()].into_iter().flatten() {
                queue.push_back(child);
            }
            nodes.insert(id, node);
            if stop {
                break;
            }
        }
        Ok(nodes)
    }

    /// Create the identity account and the member document.
    ///
    /// The document write and the parent slot claim are one store
    /// transaction; a lost slot race retries locate-and-claim from
    /// scratch. Any terminal failure after account creation deletes the
    /// account again.
    async fn create_member(
        &self,
        request: &SignupRequest,
        mut placement: Placement,
    ) -> crate::Result<(MemberId, crate::provider::AccountId)> {
        let account_id = self
            .provider
            .create_account(&request.email, &request.password, &request.display_name)
            .await?;
        let member = MemberId::new(account_id.as_str());

        let result = self
            .insert_with_retries(request, &member, &mut placement)
            .await;
        if let Err(err) = result {
            if let Err(compensation) = self.provider.delete_account(&account_id).await {
                // Do not mask the original error with the compensation
                // failure.
                tracing::warn!(
                    %member,
                    %compensation,
                    "compensating account deletion failed"
                );
            } else {
                tracing::info!(%member, "orphaned identity account deleted");
            }
            return Err(err);
        }
        Ok((member, account_id))
    }

    async fn insert_with_retries(
        &self,
        request: &SignupRequest,
        member: &MemberId,
        placement: &mut Placement,
    ) -> crate::Result<()> {
        let sequence = self.store.next_member_sequence().await?;
        let code = MemberCode::from_sequence(sequence);
        let mut attempts = 0;
        loop {
            attempts += 1;
            let document = MemberDocument {
                node: TreeNode {
                    id: member.clone(),
                    sponsor: request.sponsor.clone(),
                    upline: placement.upline.clone(),
                    left: None,
                    right: None,
                    level: placement.level,
                    active: true,
                },
                account: MemberAccount::new_signup(),
                profile: MemberProfile {
                    display_name: request.display_name.clone(),
                    email: request.email.clone(),
                    contact: request.phone.clone(),
                    wallet_address: request.wallet_address.clone(),
                },
                code: code.clone(),
                created_at: crate::now_unix(),
            };
            match self.store.insert_member(document, placement).await {
                Ok(()) => return Ok(()),
                Err(StoreError::Conflict) if attempts < self.max_txn_attempts => {
                    tracing::debug!(%member, attempts, "slot race lost, relocating");
                    *placement = self.locate_placement(request).await?;
                }
                Err(StoreError::Conflict) => {
                    return Err(crate::Error::Aborted { attempts });
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Referral then level distribution. Individual failures are logged
    /// and swallowed; the member exists either way and distribution is
    /// replayed idempotently out of band.
    async fn distribute(
        &self,
        member: &MemberId,
        sponsor: Option<&MemberId>,
        activation: &ActivationId,
    ) {
        let amount = match self.params.rank_params(Rank::default()) {
            Ok(params) => params.activation_amount,
            Err(err) => {
                tracing::warn!(%member, %err, "missing signup rank params, skipping distribution");
                return;
            }
        };
        let writer = LedgerWriter::new(&self.store);
        if let Err(err) = writer
            .record_activation(
                member.clone(),
                Rank::default(),
                amount,
                activation.clone(),
                false,
            )
            .await
        {
            tracing::warn!(%member, %err, "recording activation failed, eligible for replay");
        }
        let referral = ReferralDistributor::new(&self.store, &self.params);
        if let Err(err) = referral
            .on_activation(member, sponsor, amount, activation)
            .await
        {
            tracing::warn!(%member, %err, "referral distribution failed, eligible for replay");
        }
        let level = LevelDistributor::new(&self.store, &self.params);
        if let Err(err) = level.on_activation(member, amount, activation).await {
            tracing::warn!(%member, %err, "level distribution failed, eligible for replay");
        }
    }
}
