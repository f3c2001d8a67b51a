use super::*;
use chrono::Utc;
use proposal_core::{
    Decision, DecisionId, DecisionKind, DepartmentId, DerivedRecord, FileDescriptor, Proposal,
    ProposalContent, ProposalFilter, ProposalStatus, ProposalVersion, TeamId, UserId, Visibility,
};

fn draft(team: u64) -> Proposal {
    Proposal::new_draft(Some(TeamId(team)), UserId(1), Utc::now())
}

fn version_of(proposal: &Proposal, number: u32) -> ProposalVersion {
    ProposalVersion::new(
        proposal.id,
        number,
        ProposalContent::new(format!("title {number}"), "problem").with_objectives("objectives"),
        UserId(1),
        Utc::now(),
    )
}

async fn seed(store: &SqliteStore, team: u64) -> (Proposal, ProposalVersion) {
    let proposal = draft(team);
    let v1 = version_of(&proposal, 1);
    let (p, v) = (proposal.clone(), v1.clone());
    store
        .transact(move |tx| {
            tx.insert_proposal(&p)?;
            tx.insert_version(&v)
        })
        .await
        .map(|()| (proposal, v1))
        .unwrap()
}

#[tokio::test]
async fn schema_is_created_and_reopenable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("proposals.db");

    let store = SqliteStore::open(&path).unwrap();
    let (proposal, _) = seed(&store, 1).await;
    drop(store);

    let reopened = SqliteStore::open(&path).unwrap();
    let id = proposal.id;
    let loaded = reopened
        .transact(move |tx| tx.proposal(id))
        .await
        .unwrap();
    assert_eq!(loaded, Some(proposal));
}

#[tokio::test]
async fn proposal_roundtrips_all_fields() {
    let store = SqliteStore::open_in_memory().unwrap();
    let mut proposal = draft(3);
    proposal.reviewer_id = Some(UserId(99));
    proposal.status = ProposalStatus::Submitted;
    proposal.first_submitted_at = Some(Utc::now());

    let inserted = proposal.clone();
    let id = proposal.id;
    let loaded = store
        .transact(move |tx| {
            tx.insert_proposal(&inserted)?;
            tx.proposal(id)
        })
        .await
        .unwrap();
    assert_eq!(loaded, Some(proposal));
}

#[tokio::test]
async fn version_roundtrips_attachment() {
    let store = SqliteStore::open_in_memory().unwrap();
    let (proposal, _) = seed(&store, 1).await;
    let mut v2 = version_of(&proposal, 2);
    v2.content.attachment = Some(FileDescriptor {
        url: "mem://files/abc".into(),
        sha256: "0".repeat(64),
        byte_size: 1024,
    });
    v2.locked_at = Some(Utc::now());

    let (inserted, id) = (v2.clone(), v2.id);
    let loaded = store
        .transact(move |tx| {
            tx.insert_version(&inserted)?;
            tx.version(id)
        })
        .await
        .unwrap();
    assert_eq!(loaded, Some(v2));
}

#[tokio::test]
async fn duplicate_version_number_is_a_conflict() {
    let store = SqliteStore::open_in_memory().unwrap();
    let (proposal, _) = seed(&store, 1).await;
    let dup = version_of(&proposal, 1);

    let result: Result<(), StoreError> = store.transact(move |tx| tx.insert_version(&dup)).await;
    assert!(matches!(result, Err(StoreError::Conflict(_))));
}

#[tokio::test]
async fn partial_index_allows_one_active_proposal_per_team() {
    let store = SqliteStore::open_in_memory().unwrap();
    let (mut first, _) = seed(&store, 7).await;

    let second = draft(7);
    let retry = second.clone();
    let result: Result<(), StoreError> =
        store.transact(move |tx| tx.insert_proposal(&second)).await;
    assert!(result.unwrap_err().is_conflict());

    // Once the first one is rejected the slot frees up.
    first.status = ProposalStatus::Rejected;
    store
        .transact(move |tx| {
            tx.update_proposal(&first)?;
            tx.insert_proposal(&retry)
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn failed_closure_rolls_back() {
    let store = SqliteStore::open_in_memory().unwrap();
    let proposal = draft(1);
    let (inserted, id) = (proposal.clone(), proposal.id);

    let result: Result<(), StoreError> = store
        .transact(move |tx| {
            tx.insert_proposal(&inserted)?;
            Err(StoreError::storage("test", "injected"))
        })
        .await;
    assert!(result.is_err());

    let found = store.transact(move |tx| tx.proposal(id)).await.unwrap();
    assert!(found.is_none());
}

#[tokio::test]
async fn versions_are_newest_first_and_latest_number_tracks() {
    let store = SqliteStore::open_in_memory().unwrap();
    let (proposal, _) = seed(&store, 1).await;
    let (v2, v3) = (version_of(&proposal, 2), version_of(&proposal, 3));
    let id = proposal.id;

    let (latest, numbers) = store
        .transact(move |tx| {
            tx.insert_version(&v2)?;
            tx.insert_version(&v3)?;
            let latest = tx.latest_version_number(id)?;
            let numbers: Vec<u32> = tx.versions(id)?.iter().map(|v| v.version_number).collect();
            Ok::<_, StoreError>((latest, numbers))
        })
        .await
        .unwrap();
    assert_eq!(latest, Some(3));
    assert_eq!(numbers, vec![3, 2, 1]);
}

#[tokio::test]
async fn project_is_unique_per_proposal() {
    let store = SqliteStore::open_in_memory().unwrap();
    let (proposal, v1) = seed(&store, 1).await;
    let record = DerivedRecord::from_approved_version(
        &v1,
        TeamId(1),
        Some(DepartmentId(4)),
        UserId(9),
        Visibility::Restricted,
        Utc::now(),
    );
    let duplicate = DerivedRecord::from_approved_version(
        &v1,
        TeamId(1),
        None,
        UserId(9),
        Visibility::Public,
        Utc::now(),
    );

    let stored = record.clone();
    store
        .transact(move |tx| tx.insert_project(&stored))
        .await
        .unwrap();

    let result: Result<(), StoreError> =
        store.transact(move |tx| tx.insert_project(&duplicate)).await;
    assert!(result.unwrap_err().is_conflict());

    let id = proposal.id;
    let loaded = store
        .transact(move |tx| tx.project_for_proposal(id))
        .await
        .unwrap();
    assert_eq!(loaded, Some(record));
}

#[tokio::test]
async fn decisions_keep_insertion_order_and_cascade_on_delete() {
    let store = SqliteStore::open_in_memory().unwrap();
    let (proposal, v1) = seed(&store, 1).await;
    let decision = |kind| Decision {
        id: DecisionId::new(),
        proposal_id: proposal.id,
        version_id: v1.id,
        reviewer_id: UserId(9),
        kind,
        justification: "because".into(),
        created_at: Utc::now(),
    };
    let (first, second) = (decision(DecisionKind::Revise), decision(DecisionKind::Reject));
    let id = proposal.id;

    let kinds = store
        .transact(move |tx| {
            tx.insert_decision(&first)?;
            tx.insert_decision(&second)?;
            Ok::<_, StoreError>(tx.decisions(id)?.into_iter().map(|d| d.kind).collect::<Vec<_>>())
        })
        .await
        .unwrap();
    assert_eq!(kinds, vec![DecisionKind::Revise, DecisionKind::Reject]);

    let (versions, decisions) = store
        .transact(move |tx| {
            assert!(tx.delete_proposal(id)?);
            Ok::<_, StoreError>((tx.versions(id)?, tx.decisions(id)?))
        })
        .await
        .unwrap();
    assert!(versions.is_empty());
    assert!(decisions.is_empty());
}

#[tokio::test]
async fn filter_by_status_and_archive() {
    let store = SqliteStore::open_in_memory().unwrap();
    let (mut archived, _) = seed(&store, 1).await;
    let (kept, _) = seed(&store, 2).await;
    archived.status = ProposalStatus::Rejected;
    archived.archived_at = Some(Utc::now());

    let listed = store
        .transact(move |tx| {
            tx.update_proposal(&archived)?;
            let visible = tx.proposals(&ProposalFilter::new())?;
            let all = tx.proposals(&ProposalFilter::new().including_archived())?;
            let drafts = tx.proposals(&ProposalFilter::new().with_status(ProposalStatus::Draft))?;
            Ok::<_, StoreError>((visible.len(), all.len(), drafts))
        })
        .await
        .unwrap();
    assert_eq!(listed.0, 1);
    assert_eq!(listed.1, 2);
    assert_eq!(listed.2.len(), 1);
    assert_eq!(listed.2[0].id, kept.id);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn two_handles_on_one_file_serialize_appends() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shared.db");
    let first = SqliteStore::open(&path).unwrap();
    let second = SqliteStore::open(&path).unwrap();
    let (proposal, _) = seed(&first, 1).await;
    let id = proposal.id;

    let append = move |store: SqliteStore| async move {
        store
            .transact(move |tx| {
                let next = tx.latest_version_number(id)?.unwrap_or(0) + 1;
                let mut version = version_of(&proposal_stub(id), next);
                version.proposal_id = id;
                tx.insert_version(&version)?;
                Ok::<_, StoreError>(next)
            })
            .await
    };

    let tasks: Vec<_> = (0..8)
        .map(|i| {
            let store = if i % 2 == 0 { first.clone() } else { second.clone() };
            tokio::spawn(append(store))
        })
        .collect();
    let mut numbers: Vec<u32> = futures::future::join_all(tasks)
        .await
        .into_iter()
        .map(|r| r.unwrap().unwrap())
        .collect();
    numbers.sort_unstable();
    assert_eq!(numbers, (2..=9).collect::<Vec<_>>());
}

fn proposal_stub(id: proposal_core::ProposalId) -> Proposal {
    let mut stub = draft(1);
    stub.id = id;
    stub
}
