//! Binds each stored record to the payload types its REST resource accepts.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::domain::entities::{DocumentRecord, PatientRecord, RoleRecord, UserRecord};
use crate::domain::schemas::{
    DocumentUpdate, NewDocument, NewPatient, NewRole, NewUser, PatientUpdate, RoleUpdate,
    UserUpdate,
};
use crate::domain::validation::Validate;

pub trait Resource: Serialize + Clone + Send + Sync + 'static {
    type Create: DeserializeOwned + Validate + Send + Sync + 'static;
    type Update: DeserializeOwned + Validate + Send + Sync + 'static;

    /// Entity label used in logs and domain errors.
    const ENTITY: &'static str;

    fn id(&self) -> i64;
}

impl Resource for UserRecord {
    type Create = NewUser;
    type Update = UserUpdate;
    const ENTITY: &'static str = "user";

    fn id(&self) -> i64 {
        self.id
    }
}

impl Resource for RoleRecord {
    type Create = NewRole;
    type Update = RoleUpdate;
    const ENTITY: &'static str = "role";

    fn id(&self) -> i64 {
        self.id
    }
}

impl Resource for PatientRecord {
    type Create = NewPatient;
    type Update = PatientUpdate;
    const ENTITY: &'static str = "patient";

    fn id(&self) -> i64 {
        self.id
    }
}

impl Resource for DocumentRecord {
    type Create = NewDocument;
    type Update = DocumentUpdate;
    const ENTITY: &'static str = "document";

    fn id(&self) -> i64 {
        self.id
    }
}
