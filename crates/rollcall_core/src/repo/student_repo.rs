//! Student repository contract.

use super::RepoResult;
use crate::model::card::CardUid;
use crate::model::student::{Student, StudentId};

pub trait StudentRepository {
    /// Inserts a student; `RepoError::Conflict` when the card is taken.
    fn create_student(&self, name: &str, card_uid: &CardUid) -> RepoResult<Student>;
    fn find_student_by_uid(&self, card_uid: &CardUid) -> RepoResult<Option<Student>>;
    fn find_student_by_id(&self, id: StudentId) -> RepoResult<Option<Student>>;
    /// Deletes a student and their attendance; `RepoError::NotFound` when absent.
    fn delete_student(&self, id: StudentId) -> RepoResult<()>;
    /// All enrolled students ordered by id.
    fn list_students(&self) -> RepoResult<Vec<Student>>;
}
