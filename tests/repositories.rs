use medrecords::application::repos::{
    CreateUserParams, EntityRepo, RepoError, StatisticsRepo, UpdateUserParams, UsersRepo,
};
use medrecords::domain::entities::{DocumentRecord, PatientRecord, RoleRecord, UserRecord};
use medrecords::domain::schemas::{
    DocumentUpdate, NewDocument, NewPatient, NewRole, PatientUpdate, RoleUpdate,
};
use medrecords::domain::types::DocumentCategory;
use medrecords::infra::db::PostgresRepositories;
use sqlx::PgPool;
use time::OffsetDateTime;

type Patients = dyn EntityRepo<PatientRecord>;
type Documents = dyn EntityRepo<DocumentRecord>;
type Roles = dyn EntityRepo<RoleRecord>;

async fn seed_user(repos: &PostgresRepositories, login: &str) -> UserRecord {
    let roles: &Roles = repos;
    let role = match roles
        .create(NewRole {
            name: "physician".to_string(),
            description: None,
        })
        .await
    {
        Ok(role) => role,
        Err(_) => roles
            .list_all()
            .await
            .expect("roles")
            .into_iter()
            .next()
            .expect("role exists"),
    };

    repos
        .create_user(CreateUserParams {
            fio: format!("Doctor {login}"),
            login: login.to_string(),
            password_hash: b"$2b$04$placeholder".to_vec(),
            role_id: role.id,
        })
        .await
        .expect("user created")
}

async fn seed_patient(repos: &PostgresRepositories, fio: &str, age: i32) -> PatientRecord {
    let patients: &Patients = repos;
    patients
        .create(NewPatient {
            fio: fio.to_string(),
            age,
        })
        .await
        .expect("patient created")
}

fn new_document(patient_id: i64, author_id: Option<i64>) -> NewDocument {
    NewDocument {
        name: "discharge summary".to_string(),
        data: b"%PDF-1.7".to_vec(),
        subdirectory_type: DocumentCategory::Diagnostics,
        patient_id,
        author_id,
    }
}

#[sqlx::test(migrations = "./migrations")]
async fn patient_update_only_touches_given_fields(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let patients: &Patients = &repos;
    let created = seed_patient(&repos, "Grigoriev Oleg Nikolaevich", 44).await;

    let updated = patients
        .update(
            created.id,
            PatientUpdate {
                age: Some(45),
                ..PatientUpdate::default()
            },
        )
        .await
        .expect("update")
        .expect("row exists");
    assert_eq!(updated.fio, "Grigoriev Oleg Nikolaevich");
    assert_eq!(updated.age, 45);
    assert!(updated.updated_at >= created.updated_at);

    let missing = patients
        .update(created.id + 1000, PatientUpdate::default())
        .await
        .expect("update");
    assert!(missing.is_none());
}

#[sqlx::test(migrations = "./migrations")]
async fn unique_and_foreign_key_violations_are_classified(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let patients: &Patients = &repos;
    let documents: &Documents = &repos;
    seed_patient(&repos, "Fedorova Natalia Ivanovna", 30).await;

    let err = patients
        .create(NewPatient {
            fio: "Fedorova Natalia Ivanovna".to_string(),
            age: 31,
        })
        .await
        .expect_err("duplicate fio");
    assert_eq!(err.duplicate_field(), Some("fio"));

    let err = documents
        .create(new_document(987_654, None))
        .await
        .expect_err("missing patient");
    assert!(matches!(err, RepoError::InvalidInput { .. }), "{err:?}");
}

#[sqlx::test(migrations = "./migrations")]
async fn document_payload_survives_metadata_update(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let documents: &Documents = &repos;
    let patient = seed_patient(&repos, "Egorov Timur Maratovich", 9).await;
    let created = documents
        .create(new_document(patient.id, None))
        .await
        .expect("document created");

    let renamed = documents
        .update(
            created.id,
            DocumentUpdate {
                name: Some("referral".to_string()),
                subdirectory_type: Some(DocumentCategory::WorkPlan),
                ..DocumentUpdate::default()
            },
        )
        .await
        .expect("update")
        .expect("row exists");
    assert_eq!(renamed.name, "referral");
    assert_eq!(renamed.subdirectory_type, DocumentCategory::WorkPlan);
    assert_eq!(renamed.data, b"%PDF-1.7".to_vec());
}

#[sqlx::test(migrations = "./migrations")]
async fn deletes_cascade_and_detach_authors(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let documents: &Documents = &repos;
    let patients: &Patients = &repos;
    let author = seed_user(&repos, "therapist").await;
    let patient = seed_patient(&repos, "Nikitina Vera Alexandrovna", 66).await;
    let document = documents
        .create(new_document(patient.id, Some(author.id)))
        .await
        .expect("document created");
    assert_eq!(document.author_id, Some(author.id));

    assert!(repos.delete_user(author.id).await.expect("delete user"));
    let orphaned = documents
        .find_by_id(document.id)
        .await
        .expect("lookup")
        .expect("document kept");
    assert_eq!(orphaned.author_id, None);

    assert!(patients.delete(patient.id).await.expect("delete patient"));
    assert!(
        documents
            .find_by_id(document.id)
            .await
            .expect("lookup")
            .is_none()
    );
    assert!(!patients.delete(patient.id).await.expect("second delete"));
}

#[sqlx::test(migrations = "./migrations")]
async fn explicit_null_clears_nullable_columns(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let roles: &Roles = &repos;
    let documents: &Documents = &repos;

    let role = roles
        .create(NewRole {
            name: "cardiologist".to_string(),
            description: Some("Heart unit".to_string()),
        })
        .await
        .expect("role created");
    let renamed = roles
        .update(
            role.id,
            RoleUpdate {
                name: Some("cardiology".to_string()),
                ..RoleUpdate::default()
            },
        )
        .await
        .expect("update")
        .expect("row exists");
    assert_eq!(renamed.description.as_deref(), Some("Heart unit"));

    let cleared = roles
        .update(
            role.id,
            RoleUpdate {
                description: Some(None),
                ..RoleUpdate::default()
            },
        )
        .await
        .expect("update")
        .expect("row exists");
    assert_eq!(cleared.name, "cardiology");
    assert_eq!(cleared.description, None);

    let author = seed_user(&repos, "cardio").await;
    let patient = seed_patient(&repos, "Sergeeva Irina Pavlovna", 51).await;
    let document = documents
        .create(new_document(patient.id, Some(author.id)))
        .await
        .expect("document created");
    let detached = documents
        .update(
            document.id,
            DocumentUpdate {
                author_id: Some(None),
                ..DocumentUpdate::default()
            },
        )
        .await
        .expect("update")
        .expect("row exists");
    assert_eq!(detached.author_id, None);
    assert_eq!(detached.name, document.name);
}

#[sqlx::test(migrations = "./migrations")]
async fn deleting_a_role_removes_its_users(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let roles: &Roles = &repos;
    let documents: &Documents = &repos;
    let user = seed_user(&repos, "pediatrician").await;
    let patient = seed_patient(&repos, "Kovaleva Daria Olegovna", 6).await;
    let document = documents
        .create(new_document(patient.id, Some(user.id)))
        .await
        .expect("document created");

    assert!(roles.delete(user.role_id).await.expect("delete role"));

    assert!(repos.find_user(user.id).await.expect("lookup").is_none());
    assert!(repos.list_users().await.expect("users").is_empty());
    let kept = documents
        .find_by_id(document.id)
        .await
        .expect("lookup")
        .expect("document kept");
    assert_eq!(kept.author_id, None);
}

#[sqlx::test(migrations = "./migrations")]
async fn users_store_hash_and_toggle_activity(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let user = seed_user(&repos, "radiologist").await;
    assert!(user.active);

    let credentials = repos
        .find_credentials_by_login("radiologist")
        .await
        .expect("lookup")
        .expect("credentials");
    assert_eq!(credentials.password_hash, b"$2b$04$placeholder".to_vec());

    let updated = repos
        .update_user(
            user.id,
            UpdateUserParams {
                active: Some(false),
                ..UpdateUserParams::default()
            },
        )
        .await
        .expect("update")
        .expect("row exists");
    assert!(!updated.active);
    assert_eq!(updated.login, "radiologist");

    let err = repos
        .create_user(CreateUserParams {
            fio: "Someone Else".to_string(),
            login: "radiologist".to_string(),
            password_hash: Vec::new(),
            role_id: user.role_id,
        })
        .await
        .expect_err("duplicate login");
    assert_eq!(err.duplicate_field(), Some("login"));
}

#[sqlx::test(migrations = "./migrations")]
async fn statistics_count_todays_documents(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let documents: &Documents = &repos;
    let author = seed_user(&repos, "surgeon").await;
    let patient = seed_patient(&repos, "Orlova Svetlana Petrovna", 58).await;
    documents
        .create(new_document(patient.id, Some(author.id)))
        .await
        .expect("authored document");
    documents
        .create(new_document(patient.id, None))
        .await
        .expect("anonymous document");

    let today = OffsetDateTime::now_utc().date();
    let all = repos
        .daily_document_counts(today, None)
        .await
        .expect("counts");
    assert_eq!(all, vec![(today, 2)]);

    let authored = repos
        .daily_document_counts(today, Some(author.id))
        .await
        .expect("counts");
    assert_eq!(authored, vec![(today, 1)]);

    let nobody = repos
        .daily_document_counts(today, Some(author.id + 1000))
        .await
        .expect("counts");
    assert!(nobody.is_empty());

    let snapshot = repos.observability_snapshot().await.expect("snapshot");
    assert_eq!(snapshot.documents_total, 2);
    assert_eq!(snapshot.active_users, 1);
    assert_eq!(snapshot.patient_ages, vec![58]);
    assert_eq!(snapshot.new_patients_last_hour, 1);
    assert_eq!(
        snapshot.documents_by_category,
        vec![(DocumentCategory::Diagnostics, 2)]
    );
    assert_eq!(snapshot.users_by_role, vec![("physician".to_string(), 1)]);

    repos.ping().await.expect("database reachable");
}
