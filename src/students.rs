use axum::extract::Query;
use axum::headers::authorization::Bearer;
use axum::headers::Authorization;
use axum::{Extension, Json, TypedHeader};
use std::sync::Arc;

use crate::auth::{hash_password, TokenKeys};
use crate::err::Error;
use crate::models::{
    normalize_email, normalize_student_id, valid_email, DeleteStudent, RecordPatch, SearchParams,
    StudentProfile, UpdateStudent,
};
use crate::store::StudentStore;
use crate::{breaks, proceeds, Payload};

pub async fn search_student(
    Query(params): Query<SearchParams>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    Extension(store): Extension<StudentStore>,
    Extension(keys): Extension<Arc<TokenKeys>>,
) -> Payload<StudentProfile> {
    let queried = params
        .student_id
        .as_deref()
        .map(normalize_student_id)
        .filter(|id| !id.is_empty());

    // without a `studentId` the caller must identify itself with a token
    let student_id = match (queried, bearer) {
        (Some(id), _) => id,
        (None, Some(TypedHeader(auth))) => keys.verify(auth.token())?,
        (None, None) => {
            return breaks(Error::invalid("`studentId` query parameter was missing!"))
        }
    };

    return if let Some(student) = store.find_by_student_id(&student_id).await? {
        proceeds(student.into())
    } else {
        breaks(Error::not_found(format!(
            "Student with id `{}` does not exist!",
            student_id
        )))
    };
}

pub async fn update_student(
    payload: Option<Json<UpdateStudent>>,
    Extension(store): Extension<StudentStore>,
) -> Payload<StudentProfile> {
    let update = match payload {
        Some(Json(update)) => update,
        None => return breaks(Error::invalid("Missing update payload!")),
    };

    let student_id = normalize_student_id(&update.student_id);
    if student_id.is_empty() {
        return breaks(Error::invalid("`studentId` parameter was empty!"));
    }
    if update.new_data.is_empty() {
        return breaks(Error::invalid(
            "`newData` must contain at least one field to update!",
        ));
    }

    let mut patch = RecordPatch::default();
    if let Some(name) = update.new_data.name {
        if name.is_empty() {
            return breaks(Error::invalid("`name` must not be empty!"));
        }
        patch.name = Some(name);
    }
    if let Some(email) = update.new_data.email {
        let email = normalize_email(&email);
        if !valid_email(&email) {
            return breaks(Error::invalid(format!(
                "`{}` is not a valid email address!",
                email
            )));
        }
        patch.email = Some(email);
    }
    if let Some(password) = update.new_data.password {
        if password.is_empty() {
            return breaks(Error::invalid("`password` must not be empty!"));
        }
        // a caller can only ever patch the plaintext, never the stored hash
        patch.password_hash = Some(hash_password(&password)?);
    }

    return if let Some(updated) = store.update_partial(&student_id, &patch).await? {
        proceeds(updated.into())
    } else {
        breaks(Error::not_found(format!(
            "Student with id `{}` does not exist!",
            student_id
        )))
    };
}

pub async fn delete_student(
    payload: Option<Json<DeleteStudent>>,
    Extension(store): Extension<StudentStore>,
) -> Payload<StudentProfile> {
    let delete = match payload {
        Some(Json(delete)) => delete,
        None => return breaks(Error::invalid("Missing delete payload!")),
    };

    let student_id = normalize_student_id(&delete.student_id);
    if student_id.is_empty() {
        return breaks(Error::invalid("`studentId` parameter was empty!"));
    }

    return if let Some(deleted) = store.delete(&student_id).await? {
        proceeds(deleted.into())
    } else {
        breaks(Error::not_found(format!(
            "Student with id `{}` does not exist!",
            student_id
        )))
    };
}
