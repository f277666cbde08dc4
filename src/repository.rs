use crate::errors::AppError;
use crate::models::{
    Client, Consumption, CreateClientRequest, CreateConsumptionRequest, CreateHouseRequest, House,
    UpdateClientRequest, UpdateConsumptionRequest, UpdateHouseRequest, User,
};
use crate::storage::Store;
use chrono::{Local, Utc};
use uuid::Uuid;

pub struct Scope {
    pub readings: Vec<Consumption>,
    pub house_count: usize,
}

impl Store {
    pub fn clients_for_user(&self, user: &User) -> Vec<Client> {
        self.db
            .clients
            .iter()
            .filter(|client| client.user_id == user.id)
            .cloned()
            .collect()
    }

    pub async fn create_client(
        &mut self,
        user: &User,
        req: CreateClientRequest,
    ) -> Result<Client, AppError> {
        let name = req.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::MissingField("name"));
        }

        let client = Client {
            id: Uuid::new_v4(),
            user_id: user.id,
            name,
            contact: req.contact,
            created_at: Utc::now(),
        };
        self.db.clients.push(client.clone());
        self.commit().await?;
        Ok(client)
    }

    pub async fn update_client(
        &mut self,
        user: &User,
        id: Uuid,
        req: UpdateClientRequest,
    ) -> Result<Client, AppError> {
        let name = validate_optional_name(req.name, "name")?;

        let client = self
            .db
            .clients
            .iter_mut()
            .find(|client| client.id == id && client.user_id == user.id)
            .ok_or(AppError::NotFound("client"))?;
        if let Some(name) = name {
            client.name = name;
        }
        if let Some(contact) = req.contact {
            client.contact = Some(contact);
        }
        let updated = client.clone();

        self.commit().await?;
        Ok(updated)
    }

    pub async fn remove_client(&mut self, user: &User, id: Uuid) -> Result<(), AppError> {
        self.owned_client(user, id)?;

        let house_ids: Vec<Uuid> = self
            .db
            .houses
            .iter()
            .filter(|house| house.client_id == id)
            .map(|house| house.id)
            .collect();
        self.db.houses.retain(|house| house.client_id != id);
        self.db
            .consumptions
            .retain(|reading| !house_ids.contains(&reading.house_id));
        self.db.clients.retain(|client| client.id != id);

        self.commit().await?;
        Ok(())
    }

    pub fn houses_for_client(&self, user: &User, client_id: Uuid) -> Result<Vec<House>, AppError> {
        self.owned_client(user, client_id)?;
        Ok(self
            .db
            .houses
            .iter()
            .filter(|house| house.client_id == client_id)
            .cloned()
            .collect())
    }

    pub async fn create_house(
        &mut self,
        user: &User,
        client_id: Uuid,
        req: CreateHouseRequest,
    ) -> Result<House, AppError> {
        self.owned_client(user, client_id)?;
        let label = req.label.trim().to_string();
        if label.is_empty() {
            return Err(AppError::MissingField("label"));
        }

        let house = House {
            id: Uuid::new_v4(),
            client_id,
            label,
            address: req.address,
            created_at: Utc::now(),
        };
        self.db.houses.push(house.clone());
        self.commit().await?;
        Ok(house)
    }

    pub async fn update_house(
        &mut self,
        user: &User,
        id: Uuid,
        req: UpdateHouseRequest,
    ) -> Result<House, AppError> {
        let label = validate_optional_name(req.label, "label")?;
        self.owned_house(user, id)?;

        let house = self
            .db
            .houses
            .iter_mut()
            .find(|house| house.id == id)
            .ok_or(AppError::NotFound("house"))?;
        if let Some(label) = label {
            house.label = label;
        }
        if let Some(address) = req.address {
            house.address = Some(address);
        }
        let updated = house.clone();

        self.commit().await?;
        Ok(updated)
    }

    pub async fn remove_house(&mut self, user: &User, id: Uuid) -> Result<(), AppError> {
        self.owned_house(user, id)?;

        self.db.houses.retain(|house| house.id != id);
        self.db.consumptions.retain(|reading| reading.house_id != id);

        self.commit().await?;
        Ok(())
    }

    // Readings for one house, ascending by calendar day; the sort is stable so
    // same-day readings keep their insertion order.
    pub fn consumptions_for_house(
        &self,
        user: &User,
        house_id: Uuid,
    ) -> Result<Vec<Consumption>, AppError> {
        self.owned_house(user, house_id)?;
        let mut readings: Vec<Consumption> = self
            .db
            .consumptions
            .iter()
            .filter(|reading| reading.house_id == house_id)
            .cloned()
            .collect();
        readings.sort_by_key(|reading| reading.date);
        Ok(readings)
    }

    pub async fn create_consumption(
        &mut self,
        user: &User,
        house_id: Uuid,
        req: CreateConsumptionRequest,
    ) -> Result<Consumption, AppError> {
        self.owned_house(user, house_id)?;
        validate_kwh(req.kwh)?;

        let reading = Consumption {
            id: Uuid::new_v4(),
            house_id,
            date: req.date.unwrap_or_else(|| Local::now().date_naive()),
            kwh: req.kwh,
            note: req.note,
            created_at: Utc::now(),
        };
        self.db.consumptions.push(reading.clone());
        self.commit().await?;
        Ok(reading)
    }

    pub async fn update_consumption(
        &mut self,
        user: &User,
        id: Uuid,
        req: UpdateConsumptionRequest,
    ) -> Result<Consumption, AppError> {
        if let Some(kwh) = req.kwh {
            validate_kwh(kwh)?;
        }

        let owned = self.owned_house_ids(user);
        let reading = self
            .db
            .consumptions
            .iter_mut()
            .find(|reading| reading.id == id && owned.contains(&reading.house_id))
            .ok_or(AppError::NotFound("consumption"))?;
        if let Some(date) = req.date {
            reading.date = date;
        }
        if let Some(kwh) = req.kwh {
            reading.kwh = kwh;
        }
        if let Some(note) = req.note {
            reading.note = Some(note);
        }
        let updated = reading.clone();

        self.commit().await?;
        Ok(updated)
    }

    pub async fn remove_consumption(&mut self, user: &User, id: Uuid) -> Result<(), AppError> {
        let owned = self.owned_house_ids(user);
        if !self
            .db
            .consumptions
            .iter()
            .any(|reading| reading.id == id && owned.contains(&reading.house_id))
        {
            return Err(AppError::NotFound("consumption"));
        }

        self.db.consumptions.retain(|reading| reading.id != id);
        self.commit().await?;
        Ok(())
    }

    // Readings for the dashboard, in document (insertion) order. The scope is
    // the user's whole tree, one client, or one house, narrowest wins.
    pub fn scoped_consumptions(
        &self,
        user: &User,
        client_id: Option<Uuid>,
        house_id: Option<Uuid>,
    ) -> Result<Scope, AppError> {
        let house_ids: Vec<Uuid> = if let Some(house_id) = house_id {
            vec![self.owned_house(user, house_id)?.id]
        } else if let Some(client_id) = client_id {
            self.owned_client(user, client_id)?;
            self.db
                .houses
                .iter()
                .filter(|house| house.client_id == client_id)
                .map(|house| house.id)
                .collect()
        } else {
            self.owned_house_ids(user)
        };

        let readings = self
            .db
            .consumptions
            .iter()
            .filter(|reading| house_ids.contains(&reading.house_id))
            .cloned()
            .collect();

        Ok(Scope {
            readings,
            house_count: house_ids.len(),
        })
    }

    // Entities whose ownership chain does not reach the acting user are
    // reported as absent, not forbidden.
    fn owned_client(&self, user: &User, client_id: Uuid) -> Result<&Client, AppError> {
        self.db
            .clients
            .iter()
            .find(|client| client.id == client_id && client.user_id == user.id)
            .ok_or(AppError::NotFound("client"))
    }

    fn owned_house(&self, user: &User, house_id: Uuid) -> Result<&House, AppError> {
        let house = self
            .db
            .houses
            .iter()
            .find(|house| house.id == house_id)
            .ok_or(AppError::NotFound("house"))?;
        self.owned_client(user, house.client_id)
            .map_err(|_| AppError::NotFound("house"))?;
        Ok(house)
    }

    fn owned_house_ids(&self, user: &User) -> Vec<Uuid> {
        let client_ids: Vec<Uuid> = self
            .db
            .clients
            .iter()
            .filter(|client| client.user_id == user.id)
            .map(|client| client.id)
            .collect();
        self.db
            .houses
            .iter()
            .filter(|house| client_ids.contains(&house.client_id))
            .map(|house| house.id)
            .collect()
    }
}

fn validate_kwh(kwh: f64) -> Result<(), AppError> {
    if !kwh.is_finite() || kwh < 0.0 {
        return Err(AppError::InvalidNumericInput);
    }
    Ok(())
}

fn validate_optional_name(
    value: Option<String>,
    field: &'static str,
) -> Result<Option<String>, AppError> {
    match value {
        Some(value) => {
            let value = value.trim().to_string();
            if value.is_empty() {
                return Err(AppError::MissingField(field));
            }
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn seeded_user(store: &Store) -> User {
        store.db.users[0].clone()
    }

    async fn second_user(store: &mut Store) -> User {
        store
            .register_user("Beatriz", "bia@example.com", "s3cret-enough", Some(Role::User))
            .await
            .unwrap()
    }

    fn client_req(name: &str) -> CreateClientRequest {
        CreateClientRequest {
            name: name.to_string(),
            contact: None,
        }
    }

    fn house_req(label: &str) -> CreateHouseRequest {
        CreateHouseRequest {
            label: label.to_string(),
            address: Some("Rua A, 12".to_string()),
        }
    }

    fn reading_req(kwh: f64, date: &str) -> CreateConsumptionRequest {
        CreateConsumptionRequest {
            date: Some(date.parse().unwrap()),
            kwh,
            note: None,
        }
    }

    #[tokio::test]
    async fn clients_are_listed_per_owner() {
        let mut store = Store::in_memory().unwrap();
        let admin = seeded_user(&store);
        let other = second_user(&mut store).await;

        store.create_client(&admin, client_req("Mine")).await.unwrap();
        store.create_client(&other, client_req("Theirs")).await.unwrap();

        let mine = store.clients_for_user(&admin);
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].name, "Mine");
    }

    #[tokio::test]
    async fn create_client_requires_a_name() {
        let mut store = Store::in_memory().unwrap();
        let user = seeded_user(&store);

        let err = store.create_client(&user, client_req("   ")).await.unwrap_err();
        assert!(matches!(err, AppError::MissingField("name")));
    }

    #[tokio::test]
    async fn partial_client_update_keeps_absent_fields() {
        let mut store = Store::in_memory().unwrap();
        let user = seeded_user(&store);
        let client = store
            .create_client(
                &user,
                CreateClientRequest {
                    name: "Acme".to_string(),
                    contact: Some("555-0101".to_string()),
                },
            )
            .await
            .unwrap();

        let updated = store
            .update_client(
                &user,
                client.id,
                UpdateClientRequest {
                    name: Some("Acme Ltda".to_string()),
                    contact: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.name, "Acme Ltda");
        assert_eq!(updated.contact.as_deref(), Some("555-0101"));
    }

    #[tokio::test]
    async fn partial_house_update_keeps_address() {
        let mut store = Store::in_memory().unwrap();
        let user = seeded_user(&store);
        let client = store.create_client(&user, client_req("Acme")).await.unwrap();
        let house = store
            .create_house(&user, client.id, house_req("Beach house"))
            .await
            .unwrap();

        let updated = store
            .update_house(
                &user,
                house.id,
                UpdateHouseRequest {
                    label: Some("New Label".to_string()),
                    address: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.label, "New Label");
        assert_eq!(updated.address.as_deref(), Some("Rua A, 12"));
    }

    #[tokio::test]
    async fn partial_consumption_update_keeps_absent_fields() {
        let mut store = Store::in_memory().unwrap();
        let user = seeded_user(&store);
        let client = store.create_client(&user, client_req("Acme")).await.unwrap();
        let house = store
            .create_house(&user, client.id, house_req("H1"))
            .await
            .unwrap();
        let reading = store
            .create_consumption(
                &user,
                house.id,
                CreateConsumptionRequest {
                    date: Some("2024-04-01".parse().unwrap()),
                    kwh: 18.0,
                    note: Some("meter swap".to_string()),
                },
            )
            .await
            .unwrap();

        let updated = store
            .update_consumption(
                &user,
                reading.id,
                UpdateConsumptionRequest {
                    date: None,
                    kwh: Some(21.5),
                    note: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.kwh, 21.5);
        assert_eq!(updated.date, reading.date);
        assert_eq!(updated.note.as_deref(), Some("meter swap"));
    }

    #[tokio::test]
    async fn removing_a_client_cascades_to_houses_and_readings() {
        let mut store = Store::in_memory().unwrap();
        let user = seeded_user(&store);
        let doomed = store.create_client(&user, client_req("Doomed")).await.unwrap();
        let kept = store.create_client(&user, client_req("Kept")).await.unwrap();

        let doomed_house = store
            .create_house(&user, doomed.id, house_req("H1"))
            .await
            .unwrap();
        let doomed_house_2 = store
            .create_house(&user, doomed.id, house_req("H2"))
            .await
            .unwrap();
        let kept_house = store
            .create_house(&user, kept.id, house_req("H3"))
            .await
            .unwrap();
        store
            .create_consumption(&user, doomed_house.id, reading_req(10.0, "2024-01-01"))
            .await
            .unwrap();
        store
            .create_consumption(&user, doomed_house_2.id, reading_req(20.0, "2024-01-02"))
            .await
            .unwrap();
        store
            .create_consumption(&user, kept_house.id, reading_req(30.0, "2024-01-03"))
            .await
            .unwrap();

        store.remove_client(&user, doomed.id).await.unwrap();

        assert!(store.db.clients.iter().all(|c| c.id != doomed.id));
        assert!(store.db.houses.iter().all(|h| h.client_id != doomed.id));
        assert!(store
            .db
            .consumptions
            .iter()
            .all(|r| r.house_id == kept_house.id));
        assert_eq!(store.db.consumptions.len(), 1);
    }

    #[tokio::test]
    async fn removing_a_house_cascades_to_readings() {
        let mut store = Store::in_memory().unwrap();
        let user = seeded_user(&store);
        let client = store.create_client(&user, client_req("Acme")).await.unwrap();
        let house = store
            .create_house(&user, client.id, house_req("H1"))
            .await
            .unwrap();
        store
            .create_consumption(&user, house.id, reading_req(12.5, "2024-02-01"))
            .await
            .unwrap();

        store.remove_house(&user, house.id).await.unwrap();

        assert!(store.db.houses.is_empty());
        assert!(store.db.consumptions.is_empty());
    }

    #[tokio::test]
    async fn removing_a_reading_deletes_it_for_good() {
        let mut store = Store::in_memory().unwrap();
        let user = seeded_user(&store);
        let client = store.create_client(&user, client_req("Acme")).await.unwrap();
        let house = store
            .create_house(&user, client.id, house_req("H1"))
            .await
            .unwrap();
        let doomed = store
            .create_consumption(&user, house.id, reading_req(5.0, "2024-01-01"))
            .await
            .unwrap();
        let kept = store
            .create_consumption(&user, house.id, reading_req(6.0, "2024-01-02"))
            .await
            .unwrap();

        store.remove_consumption(&user, doomed.id).await.unwrap();

        let remaining = store.consumptions_for_house(&user, house.id).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, kept.id);

        let err = store.remove_consumption(&user, doomed.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound("consumption")));
    }

    #[tokio::test]
    async fn foreign_records_are_reported_absent() {
        let mut store = Store::in_memory().unwrap();
        let owner = seeded_user(&store);
        let intruder = second_user(&mut store).await;
        let client = store.create_client(&owner, client_req("Private")).await.unwrap();

        let err = store
            .update_client(
                &intruder,
                client.id,
                UpdateClientRequest {
                    name: Some("Hijack".to_string()),
                    contact: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound("client")));

        let err = store.remove_client(&intruder, client.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound("client")));

        let err = store.houses_for_client(&intruder, client.id).unwrap_err();
        assert!(matches!(err, AppError::NotFound("client")));
    }

    #[tokio::test]
    async fn house_readings_come_back_chronologically_with_stable_ties() {
        let mut store = Store::in_memory().unwrap();
        let user = seeded_user(&store);
        let client = store.create_client(&user, client_req("Acme")).await.unwrap();
        let house = store
            .create_house(&user, client.id, house_req("H1"))
            .await
            .unwrap();

        let later = store
            .create_consumption(&user, house.id, reading_req(30.0, "2024-03-01"))
            .await
            .unwrap();
        let tie_first = store
            .create_consumption(&user, house.id, reading_req(10.0, "2024-01-01"))
            .await
            .unwrap();
        let tie_second = store
            .create_consumption(&user, house.id, reading_req(20.0, "2024-01-01"))
            .await
            .unwrap();

        let ordered = store.consumptions_for_house(&user, house.id).unwrap();
        let ids: Vec<Uuid> = ordered.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![tie_first.id, tie_second.id, later.id]);
    }

    #[tokio::test]
    async fn kwh_must_be_finite_and_non_negative() {
        let mut store = Store::in_memory().unwrap();
        let user = seeded_user(&store);
        let client = store.create_client(&user, client_req("Acme")).await.unwrap();
        let house = store
            .create_house(&user, client.id, house_req("H1"))
            .await
            .unwrap();

        let err = store
            .create_consumption(&user, house.id, reading_req(-1.0, "2024-01-01"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidNumericInput));

        let err = store
            .create_consumption(&user, house.id, reading_req(f64::NAN, "2024-01-01"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidNumericInput));

        // A vacant house can legitimately read zero.
        let zero = store
            .create_consumption(&user, house.id, reading_req(0.0, "2024-01-01"))
            .await
            .unwrap();
        assert_eq!(zero.kwh, 0.0);

        let err = store
            .update_consumption(
                &user,
                zero.id,
                UpdateConsumptionRequest {
                    date: None,
                    kwh: Some(-3.0),
                    note: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidNumericInput));
    }

    #[tokio::test]
    async fn consumption_date_defaults_to_today() {
        let mut store = Store::in_memory().unwrap();
        let user = seeded_user(&store);
        let client = store.create_client(&user, client_req("Acme")).await.unwrap();
        let house = store
            .create_house(&user, client.id, house_req("H1"))
            .await
            .unwrap();

        let reading = store
            .create_consumption(
                &user,
                house.id,
                CreateConsumptionRequest {
                    date: None,
                    kwh: 7.5,
                    note: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(reading.date, Local::now().date_naive());
    }

    #[tokio::test]
    async fn scope_narrows_from_user_to_client_to_house() {
        let mut store = Store::in_memory().unwrap();
        let user = seeded_user(&store);
        let client_a = store.create_client(&user, client_req("A")).await.unwrap();
        let client_b = store.create_client(&user, client_req("B")).await.unwrap();
        let house_a1 = store
            .create_house(&user, client_a.id, house_req("A1"))
            .await
            .unwrap();
        let house_a2 = store
            .create_house(&user, client_a.id, house_req("A2"))
            .await
            .unwrap();
        let house_b1 = store
            .create_house(&user, client_b.id, house_req("B1"))
            .await
            .unwrap();
        store
            .create_consumption(&user, house_a1.id, reading_req(1.0, "2024-01-01"))
            .await
            .unwrap();
        store
            .create_consumption(&user, house_a2.id, reading_req(2.0, "2024-01-02"))
            .await
            .unwrap();
        store
            .create_consumption(&user, house_b1.id, reading_req(4.0, "2024-01-03"))
            .await
            .unwrap();

        let whole = store.scoped_consumptions(&user, None, None).unwrap();
        assert_eq!(whole.readings.len(), 3);
        assert_eq!(whole.house_count, 3);

        let client_scope = store
            .scoped_consumptions(&user, Some(client_a.id), None)
            .unwrap();
        assert_eq!(client_scope.readings.len(), 2);
        assert_eq!(client_scope.house_count, 2);

        let house_scope = store
            .scoped_consumptions(&user, None, Some(house_b1.id))
            .unwrap();
        assert_eq!(house_scope.readings.len(), 1);
        assert_eq!(house_scope.house_count, 1);
        assert_eq!(house_scope.readings[0].kwh, 4.0);
    }
}
