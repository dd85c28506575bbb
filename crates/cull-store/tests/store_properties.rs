//! Behavioural properties of the decision store: assignment, undo ordering,
//! batched removal, the undo bound and the durability chain.

use cull_core::{AssetId, Category};
use cull_store::{CategoryStore, Durability, StoreOptions, UNDO_CAP};
use rstest::rstest;

fn id(n: usize) -> AssetId {
    AssetId::new(format!("asset-{n}"))
}

fn mem_store() -> CategoryStore {
    CategoryStore::open(StoreOptions::in_memory())
}

#[rstest]
#[case::keep(Category::Keep)]
#[case::delete(Category::Delete)]
#[case::favorite(Category::Favorite)]
fn category_reflects_last_assignment(#[case] category: Category) {
    let store = mem_store();
    let a = id(1);

    store.assign(&a, Category::Keep);
    store.assign(&a, category);
    assert_eq!(store.category(&a), Some(category));

    store.remove(&a);
    assert_eq!(store.category(&a), None);
}

#[test]
fn undo_returns_assets_in_reverse_chronological_order() {
    let store = mem_store();
    let n = 10;
    for i in 0..n {
        store.assign(&id(i), Category::Keep);
    }

    for i in (0..n).rev() {
        assert_eq!(store.undo(), Some(id(i)));
    }
    assert_eq!(store.undo(), None, "exhausted log must return None");
}

#[test]
fn undo_restores_the_previous_category() {
    let store = mem_store();
    let a = id(1);

    // Previously unsorted: undo deletes the record.
    store.assign(&a, Category::Keep);
    store.undo();
    assert_eq!(store.category(&a), None);

    // Previously Keep: undo re-assigns Keep.
    store.assign(&a, Category::Keep);
    store.assign(&a, Category::Delete);
    store.undo();
    assert_eq!(store.category(&a), Some(Category::Keep));
}

#[test]
fn undo_log_never_exceeds_the_cap() {
    let store = mem_store();

    // 150 sequential distinct-asset assignments.
    for i in 0..150 {
        store.assign(&id(i), Category::Keep);
        assert!(store.undo_len() <= UNDO_CAP);
    }
    assert_eq!(store.undo_len(), UNDO_CAP);

    // 100 undos drain the log in strict reverse order...
    for i in (50..150).rev() {
        assert_eq!(store.undo(), Some(id(i)));
    }
    // ...and the 101st returns None: the oldest 50 entries were evicted.
    assert_eq!(store.undo(), None);
    assert!(!store.can_undo());
}

#[test]
fn batched_removal_matches_individual_removal_in_any_order() {
    let ids: Vec<AssetId> = (0..200).map(id).collect();

    let batched = mem_store();
    let individual = mem_store();
    for store in [&batched, &individual] {
        for (n, asset) in ids.iter().enumerate() {
            let category = match n % 3 {
                0 => Category::Keep,
                1 => Category::Delete,
                _ => Category::Favorite,
            };
            store.assign(asset, category);
        }
    }

    batched.remove_many(&ids[40..160]);
    // Remove the same set one by one, shuffled by stepping.
    let mut singles: Vec<&AssetId> = ids[40..160].iter().collect();
    singles.reverse();
    for asset in singles.iter().step_by(2) {
        individual.remove(asset);
    }
    for asset in singles.iter().skip(1).step_by(2) {
        individual.remove(asset);
    }

    assert_eq!(batched.counts(), individual.counts());
    assert_eq!(batched.counts().total(), 80);
}

#[test]
fn counts_are_consistent_after_every_mutation() {
    let store = mem_store();
    store.assign(&id(1), Category::Keep);
    store.assign(&id(2), Category::Favorite);
    assert_eq!(store.counts().total(), 2);

    store.undo();
    assert_eq!(store.counts().total(), 1);
    assert_eq!(store.counts().favorite, 0);

    store.reset();
    assert_eq!(store.counts().total(), 0);
    assert!(!store.can_undo());
}

#[test]
fn reset_is_irreversible() {
    let store = mem_store();
    store.assign(&id(1), Category::Keep);
    store.reset();

    assert_eq!(store.category(&id(1)), None);
    assert_eq!(store.undo(), None);
}

#[test]
fn sqlite_store_resumes_a_previous_session() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("decisions.db");

    {
        let store = CategoryStore::open(StoreOptions::persistent(&path));
        assert_eq!(store.durability(), Durability::Persistent);
        for i in 0..20 {
            store.assign(&id(i), Category::Keep);
        }
        store.assign(&id(0), Category::Favorite);
    }

    // Crash-and-restart: records, counts and undo history all survive.
    let store = CategoryStore::open(StoreOptions::persistent(&path));
    assert_eq!(store.category(&id(0)), Some(Category::Favorite));
    assert_eq!(store.counts().keep, 19);
    assert_eq!(store.counts().favorite, 1);

    assert_eq!(store.undo(), Some(id(0)));
    assert_eq!(store.category(&id(0)), Some(Category::Keep));
    assert_eq!(store.counts().keep, 20);
}

#[test]
fn degraded_store_still_satisfies_the_core_properties() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"not a directory").unwrap();

    // The persistent tier cannot open; the store degrades instead of
    // failing.
    let store = CategoryStore::open(StoreOptions::persistent(blocker.join("decisions.db")));
    assert_eq!(store.durability(), Durability::InMemory);

    store.assign(&id(1), Category::Keep);
    store.assign(&id(1), Category::Delete);
    assert_eq!(store.undo(), Some(id(1)));
    assert_eq!(store.category(&id(1)), Some(Category::Keep));
    assert_eq!(store.counts().keep, 1);
}
