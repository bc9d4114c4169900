use crate::store::UserStore;

pub struct AppState {
    pub store: UserStore,
}
