use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    config::JwtConfig,
    error::{FieldError, UserError},
    models::{NewUser, PublicUser, User},
    repository::UserRepository,
    store::UserStore,
};

#[derive(Debug, Deserialize, Validate)]
pub struct LoginDto {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Serialize)]
struct AuthResponse {
    success: bool,
    message: &'static str,
    user: PublicUser,
    token: String,
}

#[derive(Serialize)]
struct ErrorResponse<'a> {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "no_errors")]
    errors: &'a [FieldError],
}

fn no_errors(errors: &&[FieldError]) -> bool {
    errors.is_empty()
}

/// Mounts `POST /register` and `POST /login` for the given store.
pub fn configure<S: UserStore + 'static>(cfg: &mut web::ServiceConfig) {
    cfg.route("/register", web::post().to(register::<S>))
        .route("/login", web::post().to(login::<S>));
}

pub async fn register<S: UserStore + 'static>(
    repository: web::Data<UserRepository<S>>,
    jwt: web::Data<JwtConfig>,
    user_data: web::Json<NewUser>,
) -> HttpResponse {
    // Validate, hash and insert
    let user = match repository.register(user_data.into_inner()).await {
        Ok(user) => user,
        Err(e) => return error_response(&e),
    };

    respond_with_token(HttpResponse::Created(), &user, &jwt, "Utilisateur enregistré.")
}

pub async fn login<S: UserStore + 'static>(
    repository: web::Data<UserRepository<S>>,
    jwt: web::Data<JwtConfig>,
    login_data: web::Json<LoginDto>,
) -> HttpResponse {
    // Validate input
    if let Err(errors) = login_data.validate() {
        return error_response(&UserError::from(errors));
    }

    // Find user, hash included
    let user = match repository.find_for_login(&login_data.email).await {
        Ok(Some(user)) => user,
        Ok(None) => return invalid_credentials(),
        Err(e) => return error_response(&e),
    };

    // Verify password
    match user.compare_password(&login_data.password) {
        Ok(true) => {}
        Ok(false) | Err(UserError::PasswordNotLoaded) => {
            log::info!("Rejected login for user {}", user.id);
            return invalid_credentials();
        }
        Err(e) => return error_response(&e),
    }

    // Generate JWT
    respond_with_token(HttpResponse::Ok(), &user, &jwt, "Connexion réussie.")
}

fn respond_with_token(
    mut builder: actix_web::HttpResponseBuilder,
    user: &User,
    jwt: &JwtConfig,
    message: &'static str,
) -> HttpResponse {
    match user.generate_json_web_token(jwt) {
        Ok(token) => builder.json(AuthResponse {
            success: true,
            message,
            user: PublicUser::from(user),
            token,
        }),
        Err(e) => error_response(&e),
    }
}

fn invalid_credentials() -> HttpResponse {
    HttpResponse::Unauthorized().json(ErrorResponse {
        success: false,
        message: "Email ou mot de passe invalide.".to_string(),
        errors: &[],
    })
}

fn error_response(err: &UserError) -> HttpResponse {
    let body = ErrorResponse {
        success: false,
        message: err.to_string(),
        errors: err.field_errors(),
    };
    match err {
        UserError::Validation(_) => HttpResponse::BadRequest().json(body),
        UserError::DuplicateEmail(_) => HttpResponse::Conflict().json(body),
        UserError::NotFound => HttpResponse::NotFound().json(body),
        other => {
            log::error!("User request failed: {}", other);
            HttpResponse::InternalServerError().json(ErrorResponse {
                success: false,
                message: "Erreur interne du serveur.".to_string(),
                errors: &[],
            })
        }
    }
}
