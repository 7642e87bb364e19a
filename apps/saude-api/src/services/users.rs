use chrono::Utc;
use saude_db::error::DbError;
use saude_db::models::{normalize_email, NewUser, Profile, ProfileUpdate, User, UserRole};
use saude_db::repository::UserRepository;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::{hash_password_blocking, verify_password_blocking, AuthUser, TokenIssuer};
use crate::error::ApiError;

pub const MIN_PASSWORD_LEN: usize = 6;

/// Dados de cadastro com a senha ainda em texto puro
#[derive(Debug, Clone)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    pub profile: Profile,
}

#[derive(Clone)]
pub struct UserService {
    users: UserRepository,
    tokens: TokenIssuer,
}

impl UserService {
    pub fn new(users: UserRepository, tokens: TokenIssuer) -> Self {
        Self { users, tokens }
    }

    /// Cadastra o usuário e devolve também um token de acesso.
    ///
    /// Contas de administrador só podem ser criadas por outro administrador,
    /// exceto a primeira.
    pub async fn register(
        &self,
        registration: Registration,
        caller: Option<AuthUser>,
    ) -> Result<(User, String), ApiError> {
        check_password_len(&registration.password)?;

        if registration.profile == Profile::Admin {
            self.authorize_admin_registration(caller).await?;
        }

        let email = normalize_email(&registration.email);
        if self.users.find_by_email(&email).await?.is_some() {
            return Err(ApiError::BadRequest("Email já cadastrado".to_string()));
        }
        if let Profile::Professional(p) = &registration.profile {
            if self.users.exists_with_crm(&p.crm).await? {
                return Err(ApiError::BadRequest("CRM já cadastrado".to_string()));
            }
        }

        let password_hash = hash_password_blocking(registration.password).await?;
        let user = User::new(
            NewUser {
                name: registration.name,
                email,
                password_hash,
                profile: registration.profile,
            },
            Utc::now(),
        )?;
        self.users.create(&user).await?;
        info!("Usuário registrado: {} ({})", user.id(), user.role());

        let token = self.tokens.issue(&user)?;
        Ok((user, token))
    }

    async fn authorize_admin_registration(&self, caller: Option<AuthUser>) -> Result<(), ApiError> {
        if caller.map_or(false, |c| c.is(UserRole::Admin)) {
            return Ok(());
        }
        if self.users.find(Some(UserRole::Admin)).await?.is_empty() {
            warn!("Criando o primeiro administrador do sistema");
            return Ok(());
        }
        Err(ApiError::forbidden())
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<(User, String), ApiError> {
        let invalid = || ApiError::Unauthorized("Email ou senha inválidos".to_string());

        let user = self
            .users
            .find_by_email(&normalize_email(email))
            .await?
            .ok_or_else(invalid)?;

        let matches =
            verify_password_blocking(password.to_string(), user.password_hash().to_string()).await?;
        if !matches {
            return Err(invalid());
        }

        info!("Login realizado: {}", user.id());
        let token = self.tokens.issue(&user)?;
        Ok((user, token))
    }

    /// Resolve o token em uma identidade; o usuário precisa ainda existir
    pub async fn authenticate(&self, token: &str) -> Result<AuthUser, ApiError> {
        let claims = self.tokens.verify(token)?;
        let user = self
            .users
            .find_by_id(claims.sub)
            .await?
            .ok_or_else(|| ApiError::Unauthorized("Usuário não encontrado".to_string()))?;

        Ok(AuthUser {
            id: user.id(),
            role: user.role(),
        })
    }

    pub async fn profile(&self, auth: &AuthUser) -> Result<User, ApiError> {
        self.users
            .find_by_id(auth.id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Usuário não encontrado".to_string()))
    }

    /// Email, papel e senha não mudam por aqui
    pub async fn update_profile(
        &self,
        auth: &AuthUser,
        update: ProfileUpdate,
    ) -> Result<User, ApiError> {
        let mut user = self.profile(auth).await?;
        user.apply_update(update, Utc::now())?;
        self.users.update(&user).await?;
        Ok(user)
    }

    pub async fn change_password(
        &self,
        auth: &AuthUser,
        current_password: &str,
        new_password: String,
    ) -> Result<(), ApiError> {
        check_password_len(&new_password)?;

        let mut user = self.profile(auth).await?;
        let matches = verify_password_blocking(
            current_password.to_string(),
            user.password_hash().to_string(),
        )
        .await?;
        if !matches {
            return Err(ApiError::BadRequest("Senha atual incorreta".to_string()));
        }

        let hash = hash_password_blocking(new_password).await?;
        user.set_password_hash(hash, Utc::now());
        self.users.update(&user).await?;
        info!("Senha alterada: {}", user.id());
        Ok(())
    }

    pub async fn list_users(&self, auth: &AuthUser) -> Result<Vec<User>, ApiError> {
        auth.require(&[UserRole::Admin])?;
        Ok(self.users.find(None).await?)
    }

    pub async fn list_patients(&self, auth: &AuthUser) -> Result<Vec<User>, ApiError> {
        auth.require(&[UserRole::Professional, UserRole::Admin])?;
        Ok(self.users.find(Some(UserRole::Patient)).await?)
    }

    pub async fn get(&self, id: Uuid) -> Result<User, ApiError> {
        self.users
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Usuário não encontrado".to_string()))
    }

    /// O próprio usuário ou um administrador.
    ///
    /// Não há remoção em cascata: usuários com consultas, tarefas ou
    /// registros de humor vinculados não podem ser removidos.
    pub async fn delete(&self, auth: &AuthUser, id: Uuid) -> Result<(), ApiError> {
        if auth.id != id && !auth.is(UserRole::Admin) {
            return Err(ApiError::forbidden());
        }

        match self.users.delete(id).await {
            Ok(true) => {
                info!("Usuário removido: {} (por {})", id, auth.id);
                Ok(())
            }
            Ok(false) => Err(ApiError::NotFound("Usuário não encontrado".to_string())),
            Err(DbError::ConstraintViolation(_)) => Err(ApiError::BadRequest(
                "Usuário possui consultas, tarefas ou registros de humor vinculados".to_string(),
            )),
            Err(e) => Err(e.into()),
        }
    }
}

fn check_password_len(password: &str) -> Result<(), ApiError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::BadRequest(format!(
            "A senha deve ter no mínimo {} caracteres",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::{database, patient, professional, user_service};
    use anyhow::Result;
    use saude_db::models::ProfessionalProfile;

    fn admin_registration(email: &str) -> Registration {
        Registration {
            name: "Administração".to_string(),
            email: email.to_string(),
            password: "admin123".to_string(),
            profile: Profile::Admin,
        }
    }

    #[tokio::test]
    async fn test_register_and_login() -> Result<()> {
        let db = database().await?;
        let service = user_service(&db);
        let auth = patient(&db, "Joana@Exemplo.com").await?;

        let (user, token) = service.login(" joana@exemplo.com ", "senha123").await?;
        assert_eq!(user.id(), auth.id);
        assert_eq!(service.authenticate(&token).await?, auth);

        for (email, password) in [("joana@exemplo.com", "errada"), ("ninguem@exemplo.com", "senha123")] {
            match service.login(email, password).await {
                Err(ApiError::Unauthorized(msg)) => assert_eq!(msg, "Email ou senha inválidos"),
                other => panic!("resultado inesperado: {:?}", other.map(|(u, _)| u.id())),
            }
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_duplicates_are_rejected() -> Result<()> {
        let db = database().await?;
        let service = user_service(&db);
        patient(&db, "rui@exemplo.com").await?;
        professional(&db, "dra@clinica.com").await?;

        let dup_email = patient(&db, "RUI@exemplo.com").await;
        assert!(dup_email.is_err());

        let dup_crm = service
            .register(
                Registration {
                    name: "Outro".to_string(),
                    email: "outro@clinica.com".to_string(),
                    password: "senha123".to_string(),
                    profile: Profile::Professional(ProfessionalProfile {
                        crm: "CRM-dra@clinica.com".to_string(),
                        specialty: "Psicologia".to_string(),
                        biography: None,
                        available_hours: vec![],
                    }),
                },
                None,
            )
            .await;
        match dup_crm {
            Err(ApiError::BadRequest(msg)) => assert_eq!(msg, "CRM já cadastrado"),
            other => panic!("resultado inesperado: {:?}", other.map(|(u, _)| u.id())),
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_short_password_is_rejected() -> Result<()> {
        let db = database().await?;
        let mut registration = admin_registration("adm@clinica.com");
        registration.password = "12345".to_string();

        let result = user_service(&db).register(registration, None).await;
        assert!(matches!(result, Err(ApiError::BadRequest(_))));
        Ok(())
    }

    #[tokio::test]
    async fn test_admin_registration_rules() -> Result<()> {
        let db = database().await?;
        let service = user_service(&db);

        // Primeiro administrador é livre
        let (first, _) = service.register(admin_registration("a1@clinica.com"), None).await?;

        // Depois disso, só um administrador cria outro
        let anonymous = service.register(admin_registration("a2@clinica.com"), None).await;
        assert!(matches!(anonymous, Err(ApiError::Forbidden(_))));

        let pat = patient(&db, "p@exemplo.com").await?;
        let by_patient = service
            .register(admin_registration("a3@clinica.com"), Some(pat))
            .await;
        assert!(matches!(by_patient, Err(ApiError::Forbidden(_))));

        let admin = AuthUser {
            id: first.id(),
            role: UserRole::Admin,
        };
        service
            .register(admin_registration("a4@clinica.com"), Some(admin))
            .await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_change_password() -> Result<()> {
        let db = database().await?;
        let service = user_service(&db);
        let auth = patient(&db, "lia@exemplo.com").await?;

        let wrong = service
            .change_password(&auth, "errada", "nova-senha".to_string())
            .await;
        assert!(matches!(wrong, Err(ApiError::BadRequest(_))));

        let short = service.change_password(&auth, "senha123", "123".to_string()).await;
        assert!(matches!(short, Err(ApiError::BadRequest(_))));

        service
            .change_password(&auth, "senha123", "nova-senha".to_string())
            .await?;
        assert!(service.login("lia@exemplo.com", "senha123").await.is_err());
        service.login("lia@exemplo.com", "nova-senha").await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_update_profile_keeps_identity() -> Result<()> {
        let db = database().await?;
        let service = user_service(&db);
        let auth = professional(&db, "beto@clinica.com").await?;

        let user = service
            .update_profile(
                &auth,
                ProfileUpdate {
                    name: Some("Dr. Beto".to_string()),
                    biography: Some("Terapia cognitivo-comportamental".to_string()),
                    ..Default::default()
                },
            )
            .await?;
        assert_eq!(user.name(), "Dr. Beto");
        assert_eq!(user.email(), "beto@clinica.com");

        let stored = service.profile(&auth).await?;
        assert_eq!(stored, user);
        Ok(())
    }

    #[tokio::test]
    async fn test_listing_permissions() -> Result<()> {
        let db = database().await?;
        let service = user_service(&db);
        let pat = patient(&db, "x@exemplo.com").await?;
        let pro = professional(&db, "y@clinica.com").await?;

        assert!(matches!(service.list_users(&pat).await, Err(ApiError::Forbidden(_))));
        assert!(matches!(service.list_users(&pro).await, Err(ApiError::Forbidden(_))));
        assert!(matches!(service.list_patients(&pat).await, Err(ApiError::Forbidden(_))));

        let patients = service.list_patients(&pro).await?;
        assert_eq!(patients.len(), 1);
        assert_eq!(patients[0].id(), pat.id);
        Ok(())
    }

    #[tokio::test]
    async fn test_get_user_by_id() -> Result<()> {
        let db = database().await?;
        let service = user_service(&db);
        let pat = patient(&db, "lia@exemplo.com").await?;
        let pro = professional(&db, "dr.lia@clinica.com").await?;

        let user = service.get(pat.id).await?;
        assert_eq!(user.id(), pat.id);
        assert_eq!(service.get(pro.id).await?.role(), UserRole::Professional);

        assert!(matches!(
            service.get(Uuid::new_v4()).await,
            Err(ApiError::NotFound(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_self_or_admin() -> Result<()> {
        let db = database().await?;
        let service = user_service(&db);
        let a = patient(&db, "a@exemplo.com").await?;
        let b = patient(&db, "b@exemplo.com").await?;
        let c = patient(&db, "c@exemplo.com").await?;
        let (admin, _) = service.register(admin_registration("adm@clinica.com"), None).await?;
        let admin = AuthUser {
            id: admin.id(),
            role: admin.role(),
        };

        assert!(matches!(service.delete(&a, b.id).await, Err(ApiError::Forbidden(_))));

        service.delete(&a, a.id).await?;
        assert!(matches!(service.get(a.id).await, Err(ApiError::NotFound(_))));

        service.delete(&admin, c.id).await?;
        assert!(matches!(
            service.delete(&admin, c.id).await,
            Err(ApiError::NotFound(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_user_with_linked_records() -> Result<()> {
        use crate::services::{MoodInput, MoodService};
        use saude_db::models::MoodKind;

        let db = database().await?;
        let service = user_service(&db);
        let pat = patient(&db, "humor@exemplo.com").await?;
        MoodService::new(db.moods(), db.users())
            .record(
                &pat,
                MoodInput {
                    mood: MoodKind::Good,
                    intensity: 6,
                    notes: None,
                    recorded_at: None,
                },
            )
            .await?;

        match service.delete(&pat, pat.id).await {
            Err(ApiError::BadRequest(msg)) => assert!(msg.contains("vinculados")),
            other => panic!("resultado inesperado: {:?}", other),
        }
        assert_eq!(service.get(pat.id).await?.id(), pat.id);
        Ok(())
    }
}
