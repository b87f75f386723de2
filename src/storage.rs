use chrono::Utc;
use sled::transaction::{ConflictableTransactionError, TransactionError, Transactional};
use sled::Db;

use crate::error::StorageError;
use crate::models::{Comment, InsertComment, InsertProject, Project, User, VoteRecord};

/// Unified data access layer over Sled.
///
/// Documents are Serde-serialized JSON, one tree per collection:
/// - users: id -> User, with a usernames tree as the uniqueness index
/// - projects: id -> Project
/// - comments: id -> Comment
/// - votes: (project_id, user_id) composite key -> VoteRecord
/// - counters: per-collection sequential id allocators
///
/// The vote invariant (at most one vote per user/project pair, counter equals
/// the sum of recorded values) is enforced by a serializable transaction
/// across the projects and votes trees.
#[derive(Clone)] // Clone for sharing across handlers (Sled internals cheap to clone)
pub struct Storage {
    db: Db,
    users: sled::Tree,
    usernames: sled::Tree,
    projects: sled::Tree,
    comments: sled::Tree,
    votes: sled::Tree,
    counters: sled::Tree,
}

fn id_key(id: u64) -> Vec<u8> {
    id.to_be_bytes().to_vec()
}

/// Composite key: 8 bytes project id + 8 bytes user id, big endian.
/// Makes the one-vote-per-pair check a point read.
fn vote_key(project_id: u64, user_id: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(16);
    key.extend_from_slice(&project_id.to_be_bytes());
    key.extend_from_slice(&user_id.to_be_bytes());
    key
}

impl Storage {
    /// Open or create the Sled database at the given path.
    pub fn open(path: &str) -> Result<Self, StorageError> {
        let db = sled::open(path)?;
        let users = db.open_tree("users")?;
        let usernames = db.open_tree("usernames")?;
        let projects = db.open_tree("projects")?;
        let comments = db.open_tree("comments")?;
        let votes = db.open_tree("votes")?;
        let counters = db.open_tree("counters")?;
        Ok(Self {
            db,
            users,
            usernames,
            projects,
            comments,
            votes,
            counters,
        })
    }

    /// Flush all dirty buffers to disk. Called once at shutdown.
    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }

    /// Allocate the next sequential id for a collection.
    ///
    /// Counter lives in its own tree and advances with an atomic
    /// read-modify-write, so concurrent creations never observe the same id
    /// (unlike counting existing documents).
    fn next_id(&self, collection: &str) -> Result<u64, StorageError> {
        let raw = self
            .counters
            .update_and_fetch(collection, |old| {
                let next = match old {
                    Some(bytes) => {
                        let mut buf = [0u8; 8];
                        buf.copy_from_slice(bytes);
                        u64::from_be_bytes(buf) + 1
                    }
                    None => 1,
                };
                Some(next.to_be_bytes().to_vec())
            })?
            .ok_or(StorageError::NotFound)?; // unreachable: closure always returns Some

        let mut buf = [0u8; 8];
        buf.copy_from_slice(&raw);
        Ok(u64::from_be_bytes(buf))
    }

    // --- Users ---

    pub fn get_user(&self, id: u64) -> Result<Option<User>, StorageError> {
        match self.users.get(id_key(id))? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<User>, StorageError> {
        match self.usernames.get(username.as_bytes())? {
            Some(raw) => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(&raw);
                self.get_user(u64::from_be_bytes(buf))
            }
            None => Ok(None),
        }
    }

    /// Create a user with the given (already hashed) credential.
    ///
    /// Username uniqueness is claimed with compare-and-swap on the index
    /// tree; the loser of a concurrent registration race gets
    /// `DuplicateUsername`.
    pub fn create_user(&self, username: &str, password_hash: &str) -> Result<User, StorageError> {
        let id = self.next_id("users")?;

        let claimed = self
            .usernames
            .compare_and_swap(username.as_bytes(), None as Option<&[u8]>, Some(id_key(id)))?;
        if claimed.is_err() {
            return Err(StorageError::DuplicateUsername);
        }

        let user = User {
            id,
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            reputation: 0,
            avatar: None,
        };
        self.users.insert(id_key(id), serde_json::to_vec(&user)?)?;
        Ok(user)
    }

    // --- Projects ---

    pub fn get_all_projects(&self) -> Result<Vec<Project>, StorageError> {
        let mut projects = vec![];
        for item in self.projects.iter() {
            let (_, raw) = item?;
            projects.push(serde_json::from_slice(&raw)?);
        }
        Ok(projects)
    }

    pub fn get_project(&self, id: u64) -> Result<Option<Project>, StorageError> {
        match self.projects.get(id_key(id))? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn create_project(
        &self,
        insert: InsertProject,
        user_id: u64,
    ) -> Result<Project, StorageError> {
        let id = self.next_id("projects")?;
        let project = Project {
            id,
            title: insert.title,
            description: insert.description,
            category: insert.category,
            location: insert.location,
            area: insert.area,
            status: "active".to_string(),
            user_id,
            impact_score: 0,
            votes: 0,
            created_at: Utc::now(),
            image: insert.image,
            donation_requirement: insert.donation_requirement,
            volunteer_requirement: insert.volunteer_requirement,
        };
        self.projects
            .insert(id_key(id), serde_json::to_vec(&project)?)?;
        Ok(project)
    }

    /// Delete a project if it exists and the requester owns it.
    ///
    /// Returns false both for an absent project and for an ownership
    /// mismatch; this is an authorization check, not an exception.
    pub fn delete_project(&self, project_id: u64, requester_id: u64) -> Result<bool, StorageError> {
        let project = match self.get_project(project_id)? {
            Some(p) => p,
            None => return Ok(false),
        };
        if project.user_id != requester_id {
            return Ok(false);
        }
        self.projects.remove(id_key(project_id))?;
        Ok(true)
    }

    // --- Votes ---

    pub fn has_user_voted(&self, project_id: u64, user_id: u64) -> Result<bool, StorageError> {
        Ok(self.votes.get(vote_key(project_id, user_id))?.is_some())
    }

    /// Record a single +1/-1 vote.
    ///
    /// The duplicate check, counter update and vote insert run in one
    /// serializable transaction across the projects and votes trees: either
    /// both writes commit or neither does, and two concurrent attempts for
    /// the same (user, project) pair cannot both succeed. Conflict retry is
    /// Sled's responsibility, not ours.
    pub fn record_vote(
        &self,
        project_id: u64,
        user_id: u64,
        value: i64,
    ) -> Result<Project, StorageError> {
        let key = vote_key(project_id, user_id);
        let now = Utc::now();

        let result = (&self.projects, &self.votes).transaction(|(projects, votes)| {
            if votes.get(&key)?.is_some() {
                return Err(ConflictableTransactionError::Abort(
                    StorageError::AlreadyVoted,
                ));
            }

            let raw = projects
                .get(id_key(project_id))?
                .ok_or(ConflictableTransactionError::Abort(StorageError::NotFound))?;
            let mut project: Project = serde_json::from_slice(&raw)
                .map_err(|e| ConflictableTransactionError::Abort(StorageError::Codec(e)))?;
            project.votes += value;

            let record = VoteRecord {
                user_id,
                project_id,
                value,
                created_at: now,
            };

            let project_bytes = serde_json::to_vec(&project)
                .map_err(|e| ConflictableTransactionError::Abort(StorageError::Codec(e)))?;
            let record_bytes = serde_json::to_vec(&record)
                .map_err(|e| ConflictableTransactionError::Abort(StorageError::Codec(e)))?;

            projects.insert(id_key(project_id), project_bytes)?;
            votes.insert(key.clone(), record_bytes)?;
            Ok(project)
        });

        match result {
            Ok(project) => Ok(project),
            Err(TransactionError::Abort(err)) => Err(err),
            Err(TransactionError::Storage(err)) => Err(StorageError::Db(err)),
        }
    }

    // --- Comments ---

    pub fn get_project_comments(&self, project_id: u64) -> Result<Vec<Comment>, StorageError> {
        let mut comments = vec![];
        for item in self.comments.iter() {
            let (_, raw) = item?;
            let comment: Comment = serde_json::from_slice(&raw)?;
            if comment.project_id == project_id {
                comments.push(comment);
            }
        }
        Ok(comments)
    }

    pub fn create_comment(
        &self,
        insert: InsertComment,
        project_id: u64,
        user_id: u64,
    ) -> Result<Comment, StorageError> {
        let id = self.next_id("comments")?;
        let comment = Comment {
            id,
            content: insert.content,
            user_id,
            project_id,
            created_at: Utc::now(),
        };
        self.comments
            .insert(id_key(id), serde_json::to_vec(&comment)?)?;
        Ok(comment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LatLng;
    use std::fs;

    fn temp_storage(name: &str) -> (Storage, std::path::PathBuf) {
        let temp_dir = std::env::temp_dir().join(name);
        let _ = fs::remove_dir_all(&temp_dir); // Clean up previous test data
        let storage = Storage::open(temp_dir.to_str().unwrap()).expect("Failed to open storage");
        (storage, temp_dir)
    }

    fn sample_project() -> InsertProject {
        InsertProject {
            title: "Community Garden".to_string(),
            description: "Turn the empty lot into a garden".to_string(),
            category: "Environment".to_string(),
            location: LatLng {
                lat: 52.52,
                lng: 13.405,
            },
            area: None,
            image: None,
            donation_requirement: None,
            volunteer_requirement: None,
        }
    }

    #[test]
    fn test_user_create_and_lookup() {
        let (storage, temp_dir) = temp_storage("hood_hive_test_users");

        let alice = storage.create_user("alice", "hash_a").expect("create alice");
        assert_eq!(alice.id, 1);
        assert_eq!(alice.reputation, 0);
        assert!(alice.avatar.is_none());

        let bob = storage.create_user("bob", "hash_b").expect("create bob");
        assert_eq!(bob.id, 2);

        let by_id = storage.get_user(alice.id).expect("get").expect("present");
        assert_eq!(by_id.username, "alice");

        let by_name = storage
            .get_user_by_username("bob")
            .expect("get")
            .expect("present");
        assert_eq!(by_name.id, bob.id);

        assert!(storage.get_user(99).expect("get").is_none());
        assert!(storage.get_user_by_username("nobody").expect("get").is_none());

        let _ = fs::remove_dir_all(temp_dir);
    }

    #[test]
    fn test_duplicate_username_rejected() {
        let (storage, temp_dir) = temp_storage("hood_hive_test_dup_user");

        storage.create_user("alice", "hash_a").expect("first");
        let err = storage.create_user("alice", "hash_b").unwrap_err();
        assert!(matches!(err, StorageError::DuplicateUsername));

        let _ = fs::remove_dir_all(temp_dir);
    }

    #[test]
    fn test_project_defaults_and_listing() {
        let (storage, temp_dir) = temp_storage("hood_hive_test_projects");

        assert!(storage.get_all_projects().expect("list").is_empty());

        let project = storage
            .create_project(sample_project(), 7)
            .expect("create project");
        assert_eq!(project.id, 1);
        assert_eq!(project.status, "active");
        assert_eq!(project.votes, 0);
        assert_eq!(project.impact_score, 0);
        assert_eq!(project.user_id, 7);

        let listed = storage.get_all_projects().expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].title, "Community Garden");

        let fetched = storage.get_project(project.id).expect("get").expect("present");
        assert_eq!(fetched.id, project.id);
        assert!(storage.get_project(42).expect("get").is_none());

        let _ = fs::remove_dir_all(temp_dir);
    }

    #[test]
    fn test_zero_requirements_preserved() {
        let (storage, temp_dir) = temp_storage("hood_hive_test_zero_req");

        let mut insert = sample_project();
        insert.donation_requirement = Some(0.0);
        insert.volunteer_requirement = Some(0);
        let project = storage.create_project(insert, 1).expect("create");

        let fetched = storage.get_project(project.id).expect("get").expect("present");
        assert_eq!(fetched.donation_requirement, Some(0.0));
        assert_eq!(fetched.volunteer_requirement, Some(0));

        let _ = fs::remove_dir_all(temp_dir);
    }

    #[test]
    fn test_delete_project_ownership() {
        let (storage, temp_dir) = temp_storage("hood_hive_test_delete");

        let project = storage.create_project(sample_project(), 1).expect("create");

        // Wrong owner: silent refusal, project stays.
        assert!(!storage.delete_project(project.id, 2).expect("delete"));
        assert!(storage.get_project(project.id).expect("get").is_some());

        // Absent project.
        assert!(!storage.delete_project(999, 1).expect("delete"));

        // Owner deletes.
        assert!(storage.delete_project(project.id, 1).expect("delete"));
        assert!(storage.get_project(project.id).expect("get").is_none());

        let _ = fs::remove_dir_all(temp_dir);
    }

    #[test]
    fn test_votes_sum_to_counter() {
        let (storage, temp_dir) = temp_storage("hood_hive_test_vote_sum");

        let project = storage.create_project(sample_project(), 1).expect("create");
        storage.record_vote(project.id, 10, 1).expect("vote 1");
        storage.record_vote(project.id, 11, 1).expect("vote 2");
        storage.record_vote(project.id, 12, -1).expect("vote 3");

        let fetched = storage.get_project(project.id).expect("get").expect("present");
        assert_eq!(fetched.votes, 1);
        assert!(storage.has_user_voted(project.id, 10).expect("check"));
        assert!(!storage.has_user_voted(project.id, 13).expect("check"));

        let _ = fs::remove_dir_all(temp_dir);
    }

    #[test]
    fn test_second_vote_rejected_counter_unchanged() {
        let (storage, temp_dir) = temp_storage("hood_hive_test_double_vote");

        let project = storage.create_project(sample_project(), 1).expect("create");
        storage.record_vote(project.id, 5, 1).expect("first vote");

        let err = storage.record_vote(project.id, 5, -1).unwrap_err();
        assert!(matches!(err, StorageError::AlreadyVoted));

        let fetched = storage.get_project(project.id).expect("get").expect("present");
        assert_eq!(fetched.votes, 1);

        let _ = fs::remove_dir_all(temp_dir);
    }

    #[test]
    fn test_vote_on_missing_project() {
        let (storage, temp_dir) = temp_storage("hood_hive_test_vote_missing");

        let err = storage.record_vote(404, 1, 1).unwrap_err();
        assert!(matches!(err, StorageError::NotFound));

        let _ = fs::remove_dir_all(temp_dir);
    }

    #[test]
    fn test_concurrent_same_pair_votes() {
        let (storage, temp_dir) = temp_storage("hood_hive_test_concurrent_vote");

        let project = storage.create_project(sample_project(), 1).expect("create");

        let mut handles = vec![];
        for _ in 0..2 {
            let storage = storage.clone();
            let project_id = project.id;
            handles.push(std::thread::spawn(move || {
                storage.record_vote(project_id, 42, 1)
            }));
        }

        let results: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().expect("thread"))
            .collect();
        let successes = results.iter().filter(|r| r.is_ok()).count();
        let rejected = results
            .iter()
            .filter(|r| matches!(r, Err(StorageError::AlreadyVoted)))
            .count();
        assert_eq!(successes, 1);
        assert_eq!(rejected, 1);

        let fetched = storage.get_project(project.id).expect("get").expect("present");
        assert_eq!(fetched.votes, 1);

        let _ = fs::remove_dir_all(temp_dir);
    }

    #[test]
    fn test_concurrent_distinct_user_votes_no_lost_update() {
        let (storage, temp_dir) = temp_storage("hood_hive_test_distinct_votes");

        let project = storage.create_project(sample_project(), 1).expect("create");

        let mut handles = vec![];
        for user_id in 100..110 {
            let storage = storage.clone();
            let project_id = project.id;
            handles.push(std::thread::spawn(move || {
                storage.record_vote(project_id, user_id, 1)
            }));
        }
        for handle in handles {
            handle.join().expect("thread").expect("vote");
        }

        let fetched = storage.get_project(project.id).expect("get").expect("present");
        assert_eq!(fetched.votes, 10);

        let _ = fs::remove_dir_all(temp_dir);
    }

    #[test]
    fn test_comments_scoped_to_project() {
        let (storage, temp_dir) = temp_storage("hood_hive_test_comments");

        let first = storage.create_project(sample_project(), 1).expect("create");
        let second = storage.create_project(sample_project(), 1).expect("create");

        let insert = InsertComment {
            content: "Count me in".to_string(),
        };
        let comment = storage
            .create_comment(insert, first.id, 9)
            .expect("comment");
        assert_eq!(comment.id, 1);
        assert_eq!(comment.project_id, first.id);

        let for_first = storage.get_project_comments(first.id).expect("list");
        assert_eq!(for_first.len(), 1);
        assert_eq!(for_first[0].content, "Count me in");

        assert!(storage.get_project_comments(second.id).expect("list").is_empty());

        let _ = fs::remove_dir_all(temp_dir);
    }
}
